//! Mock LLM provider: scripted replies for tests and offline runs.
//!
//! Replies are served in order. Once the script is exhausted the provider
//! answers with one JSON object that carries a neutral field for every
//! collaborator shape, so a whole session can run without an API key.

use crate::api_types::{Message, MessagesResponse};
use crate::llm::{CompletionParams, LlmClient};
use anyhow::Result;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug)]
pub struct MockProvider {
    model: String,
    script: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(model: &str) -> Self {
        Self::with_replies(model, Vec::new())
    }

    pub fn with_replies(model: &str, replies: Vec<String>) -> Self {
        Self {
            model: model.to_string(),
            script: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fallback_reply(&self) -> String {
        json!({
            "states": [],
            "activate": [],
            "increase_weight": [],
            "respond": true,
            "themes": ["разговор"],
            "urgency": 0.5,
            "response": format!("(Mock {}) Я тебя слышу.", self.model),
            "text": format!("(Mock {}) ...", self.model),
            "increase": [],
            "decrease": [],
            "concepts": []
        })
        .to_string()
    }
}

#[async_trait::async_trait]
impl LlmClient for MockProvider {
    async fn complete(
        &self,
        _system: &str,
        _messages: Vec<Message>,
        _params: CompletionParams,
    ) -> Result<MessagesResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = match self.script.lock() {
            Ok(mut script) => script.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        let text = scripted.unwrap_or_else(|| self.fallback_reply());
        Ok(MessagesResponse::from_text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_fallback() {
        let provider = MockProvider::with_replies("test-model", vec!["первый".into()]);
        let first = provider
            .complete("system", vec![], CompletionParams::default())
            .await
            .unwrap();
        assert_eq!(first.text, "первый");

        let second = provider
            .complete("system", vec![], CompletionParams::default())
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&second.text).unwrap();
        assert_eq!(value["respond"], true);
        assert!(value["response"].as_str().unwrap().contains("test-model"));
        assert_eq!(provider.calls(), 2);
    }
}
