//! # Anima Reasoning (System 2)
//!
//! The slow, verbal half: language-model collaborators that classify, empathise,
//! decide and speak, and the [`Session`] that runs the per-turn pipeline over
//! the limbic engine and the memory stores.

pub mod api_types;
pub mod collaborator;
pub mod llm;
pub mod prompts;
pub mod providers;
pub mod retry;
pub mod schema;
pub mod session;

pub use collaborator::{Collaborator, LlmCollaborator};
pub use llm::{CompletionParams, LlmClient};
pub use session::{Session, SessionStatus, SpontaneousUtterance, TurnOutcome};
