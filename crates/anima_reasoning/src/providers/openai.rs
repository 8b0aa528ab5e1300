use crate::api_types::{Message, MessagesResponse, Role};
use crate::llm::{CompletionParams, LlmClient};
use crate::retry::{with_retry, RetryConfig};
use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::{json, Value};
use std::env;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat-completions client for OpenAI and compatible endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    retry: RetryConfig,
}

impl OpenAiClient {
    /// `base_url` wins over `OPENAI_BASE_URL`; the key comes from
    /// `OPENAI_API_KEY`.
    pub fn new(model: &str, base_url: Option<&str>) -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY").context("OPENAI_API_KEY is not set")?;
        let base_url = base_url
            .map(String::from)
            .or_else(|| env::var("OPENAI_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(60)).build()?,
            api_key,
            base_url,
            model: model.to_string(),
            retry: RetryConfig::default(),
        })
    }

    fn payload(&self, system: &str, messages: &[Message], params: &CompletionParams) -> Value {
        let mut openai_messages = vec![json!({ "role": "system", "content": system })];
        openai_messages.extend(messages.iter().map(|m| {
            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            json!({ "role": role, "content": m.content })
        }));

        let mut payload = json!({
            "model": self.model,
            "messages": openai_messages,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        });
        if params.json_mode {
            payload["response_format"] = json!({ "type": "json_object" });
        }
        payload
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(
        &self,
        system: &str,
        messages: Vec<Message>,
        params: CompletionParams,
    ) -> Result<MessagesResponse> {
        let payload = self.payload(system, &messages, &params);
        let url = format!("{}/chat/completions", self.base_url);

        let response = with_retry(&self.retry, "OpenAI", || {
            let request = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&payload);
            async move { request.send().await.map_err(anyhow::Error::from) }
        })
        .await?;

        let body: Value = response
            .json()
            .await
            .context("OpenAI response is not JSON")?;
        parse_completion(&body)
    }
}

fn parse_completion(body: &Value) -> Result<MessagesResponse> {
    let choice = &body["choices"][0];
    let text = choice["message"]["content"]
        .as_str()
        .context("OpenAI response has no message content")?;
    Ok(MessagesResponse {
        text: text.to_string(),
        stop_reason: choice["finish_reason"].as_str().map(String::from),
    })
}
