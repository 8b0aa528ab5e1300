//! # Anima Core
//!
//! Shared vocabulary for the affective engine: the immutable state graph,
//! the per-session activation store, configuration and the error taxonomy.

pub mod activation;
pub mod config;
pub mod error;
pub mod graph;

pub use activation::{ActivationStore, Bump};
pub use config::{
    ActivationConfig, AnimaConfig, GraphConfig, LlmConfig, MemoryConfig, PressureConfig,
    PropagationConfig, SessionConfig, TriggerConfig,
};
pub use error::{CollaboratorError, CollaboratorKind, ConfigError, GraphWarning, StorageError};
pub use graph::{StateDefinition, StateGraph};
