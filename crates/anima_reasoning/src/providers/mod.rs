pub mod mock;
pub mod openai;

use crate::llm::LlmClient;
use anima_core::LlmConfig;
use anyhow::Result;
use std::sync::Arc;

pub use mock::MockProvider;
pub use openai::OpenAiClient;

/// Build the client named by `config.provider`.
pub fn build_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiClient::new(
            &config.model,
            config.base_url.as_deref(),
        )?)),
        "mock" => Ok(Arc::new(MockProvider::new(&config.model))),
        other => anyhow::bail!("Unknown LLM provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_mock_and_unknown() {
        let config = LlmConfig {
            provider: "mock".into(),
            ..LlmConfig::default()
        };
        assert!(build_client(&config).is_ok());

        let config = LlmConfig {
            provider: "carrier-pigeon".into(),
            ..LlmConfig::default()
        };
        let err = build_client(&config).err().unwrap();
        assert!(err.to_string().contains("carrier-pigeon"));
    }
}
