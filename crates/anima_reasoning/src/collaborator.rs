//! The external judgement the engine relies on, behind one trait.
//!
//! Every method returns an explicit `Result` so the session can tell "nothing
//! detected" from "the call failed". [`LlmCollaborator`] implements the trait
//! over any [`LlmClient`]; tests script it directly.

use crate::api_types::Message;
use crate::llm::{CompletionParams, LlmClient};
use crate::prompts;
use crate::schema::{
    parse_concepts, parse_generated_text, parse_reply, Classification, EmpathyDecision,
    Reanalysis, ResponseNeed,
};
use anima_core::{CollaboratorError, StateGraph};
use anima_memory::ConceptDraft;
use async_trait::async_trait;
use std::sync::Arc;

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ClassifyRequest {
    pub utterance: String,
    pub active_states: Vec<String>,
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EmpathyRequest {
    pub active_states: Vec<(String, f32)>,
    pub interlocutor_states: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ResponseNeedRequest {
    pub active_states: Vec<(String, f32)>,
    pub pressure: f32,
    pub utterance: String,
    pub history: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub utterance: String,
    pub themes: Vec<String>,
    pub active_states: Vec<(String, f32)>,
    pub related_concepts: Vec<String>,
    pub memories: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SpontaneousRequest {
    pub triggered: Vec<String>,
    pub top_states: Vec<(String, f32)>,
    pub history: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReanalysisRequest {
    pub utterance: String,
    pub response: String,
    pub journal_tail: String,
    pub top_states: Vec<(String, f32)>,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionRequest {
    pub utterance: String,
    pub response: String,
    pub active_states: Vec<String>,
}

/// `name (0.80), ...`
pub fn describe_levels(levels: &[(String, f32)]) -> String {
    levels
        .iter()
        .map(|(name, level)| format!("{} ({:.2})", name, level))
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// Trait
// ============================================================================

#[async_trait]
pub trait Collaborator: Send + Sync {
    async fn classify(&self, req: ClassifyRequest) -> Result<Classification, CollaboratorError>;

    async fn empathize(&self, req: EmpathyRequest) -> Result<EmpathyDecision, CollaboratorError>;

    async fn assess_need(
        &self,
        req: ResponseNeedRequest,
    ) -> Result<ResponseNeed, CollaboratorError>;

    async fn generate(&self, req: GenerationRequest) -> Result<String, CollaboratorError>;

    async fn spontaneous(&self, req: SpontaneousRequest) -> Result<String, CollaboratorError>;

    async fn reanalyze(&self, req: ReanalysisRequest) -> Result<Reanalysis, CollaboratorError>;

    async fn extract_concepts(
        &self,
        req: ExtractionRequest,
    ) -> Result<Vec<ConceptDraft>, CollaboratorError>;
}

// ============================================================================
// LLM-backed implementation
// ============================================================================

pub struct LlmCollaborator {
    client: Arc<dyn LlmClient>,
    params: CompletionParams,
    tree: String,
}

impl LlmCollaborator {
    pub fn new(client: Arc<dyn LlmClient>, graph: &StateGraph, params: CompletionParams) -> Self {
        Self {
            client,
            params,
            tree: tree_excerpt(graph, prompts::TREE_EXCERPT_CHARS),
        }
    }

    async fn ask(&self, system: &str, prompt: String, json: bool) -> Result<String, CollaboratorError> {
        let mut params = self.params.clone();
        params.json_mode = json;
        let response = self
            .client
            .complete(system, vec![Message::user(prompt)], params)
            .await
            .map_err(|e| CollaboratorError::Transport(format!("{:#}", e)))?;
        Ok(response.text)
    }
}

/// One `name: cond1, cond2` line per state, cut at `max_chars`.
fn tree_excerpt(graph: &StateGraph, max_chars: usize) -> String {
    let full = graph
        .definitions()
        .iter()
        .map(|d| {
            if d.conditions.is_empty() {
                format!("{}: -", d.name)
            } else {
                format!("{}: {}", d.name, d.conditions.join(", "))
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    full.chars().take(max_chars).collect()
}

#[async_trait]
impl Collaborator for LlmCollaborator {
    async fn classify(&self, req: ClassifyRequest) -> Result<Classification, CollaboratorError> {
        let prompt = prompts::classify(&req.utterance, &req.active_states, &req.candidates, &self.tree);
        let reply = self.ask(prompts::CLASSIFIER_SYSTEM, prompt, true).await?;
        parse_reply(&reply)
    }

    async fn empathize(&self, req: EmpathyRequest) -> Result<EmpathyDecision, CollaboratorError> {
        let prompt = prompts::empathy(
            &describe_levels(&req.active_states),
            &req.interlocutor_states,
            &self.tree,
        );
        let reply = self.ask(prompts::EMPATHY_SYSTEM, prompt, true).await?;
        parse_reply(&reply)
    }

    async fn assess_need(
        &self,
        req: ResponseNeedRequest,
    ) -> Result<ResponseNeed, CollaboratorError> {
        let prompt = prompts::response_need(
            &describe_levels(&req.active_states),
            req.pressure,
            &req.utterance,
            &req.history,
        );
        let reply = self.ask(prompts::RESPONSE_NEED_SYSTEM, prompt, true).await?;
        parse_reply(&reply)
    }

    async fn generate(&self, req: GenerationRequest) -> Result<String, CollaboratorError> {
        let prompt = prompts::generate(
            &req.utterance,
            &req.themes,
            &describe_levels(&req.active_states),
            &req.related_concepts,
            &req.memories,
        );
        let reply = self.ask(prompts::GENERATOR_SYSTEM, prompt, true).await?;
        parse_generated_text(&reply)
    }

    async fn spontaneous(&self, req: SpontaneousRequest) -> Result<String, CollaboratorError> {
        let prompt = prompts::spontaneous(
            &req.triggered,
            &describe_levels(&req.top_states),
            &req.history,
        );
        let reply = self.ask(prompts::SPONTANEOUS_SYSTEM, prompt, true).await?;
        parse_generated_text(&reply)
    }

    async fn reanalyze(&self, req: ReanalysisRequest) -> Result<Reanalysis, CollaboratorError> {
        let prompt = prompts::reanalyze(
            &req.utterance,
            &req.response,
            &req.journal_tail,
            &describe_levels(&req.top_states),
        );
        let reply = self.ask(prompts::REANALYSIS_SYSTEM, prompt, true).await?;
        parse_reply(&reply)
    }

    async fn extract_concepts(
        &self,
        req: ExtractionRequest,
    ) -> Result<Vec<ConceptDraft>, CollaboratorError> {
        let prompt = prompts::extract(&req.utterance, &req.response, &req.active_states);
        let reply = self.ask(prompts::EXTRACTION_SYSTEM, prompt, true).await?;
        parse_concepts(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockProvider;
    use anima_core::StateDefinition;

    fn graph() -> StateGraph {
        StateGraph::from_definitions(vec![
            StateDefinition::new("Грусть", &[]),
            StateDefinition::new("Тоска", &["Грусть"]),
        ])
        .unwrap()
    }

    fn collaborator(replies: &[&str]) -> (Arc<MockProvider>, LlmCollaborator) {
        let provider = Arc::new(MockProvider::with_replies(
            "test",
            replies.iter().map(|r| r.to_string()).collect(),
        ));
        let c = LlmCollaborator::new(provider.clone(), &graph(), CompletionParams::default());
        (provider, c)
    }

    #[test]
    fn test_tree_excerpt() {
        let tree = tree_excerpt(&graph(), 1000);
        assert_eq!(tree, "Грусть: -\nТоска: Грусть");
        assert_eq!(tree_excerpt(&graph(), 3).chars().count(), 3);
    }

    #[tokio::test]
    async fn test_classify_through_client() {
        let (provider, c) = collaborator(&[r#"{"states": ["Грусть"], "confidence": 0.9}"#]);
        let result = c
            .classify(ClassifyRequest {
                utterance: "мне плохо".into(),
                ..ClassifyRequest::default()
            })
            .await
            .unwrap();
        assert_eq!(result.states, vec!["Грусть"]);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_malformed_reply_is_an_error() {
        let (_, c) = collaborator(&["совсем не json"]);
        let err = c.reanalyze(ReanalysisRequest::default()).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_generate_accepts_plain_text() {
        let (_, c) = collaborator(&["Я рядом."]);
        let text = c.generate(GenerationRequest::default()).await.unwrap();
        assert_eq!(text, "Я рядом.");
    }

    #[test]
    fn test_describe_levels() {
        let s = describe_levels(&[("Гнев".into(), 0.9), ("Сомнение".into(), 0.456)]);
        assert_eq!(s, "Гнев (0.90), Сомнение (0.46)");
    }
}
