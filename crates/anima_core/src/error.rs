//! Error taxonomy shared across the workspace.
//!
//! Only [`ConfigError`] is allowed to stop a session, and only at startup.
//! Everything else degrades to "no new signal this turn".

use std::path::PathBuf;
use thiserror::Error;

/// Malformed or missing state-graph source. Fatal before any turn runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read state graph {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state graph is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("state graph has no top-level `{0}` list")]
    MissingKey(String),

    #[error("`{key}` must be a list")]
    NotAList { key: String },

    #[error("state #{index} is invalid: {reason}")]
    InvalidState { index: usize, reason: String },

    #[error("state `{0}` is defined more than once")]
    DuplicateState(String),
}

/// Which external collaborator a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollaboratorKind {
    Classifier,
    Empathy,
    ResponseNeed,
    Generator,
    Spontaneous,
    Reanalysis,
    Extraction,
}

/// An external language-model call failed or returned unusable data.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("collaborator call failed: {0}")]
    Transport(String),

    #[error("collaborator reply is malformed: {0}")]
    Malformed(String),

    #[error("collaborator reply is empty")]
    Empty,
}

/// Durable write (knowledge store, journal) failed.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Non-fatal data-quality finding recorded while loading a state graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphWarning {
    /// `state` lists `condition`, which is not defined anywhere in the graph.
    UndefinedCondition { state: String, condition: String },
    /// Condition edges form a loop through `states` (in traversal order).
    /// The closing edge is ignored for traversal.
    Cycle { states: Vec<String> },
}

impl std::fmt::Display for GraphWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphWarning::UndefinedCondition { state, condition } => {
                write!(f, "state `{}` has undefined condition `{}`", state, condition)
            }
            GraphWarning::Cycle { states } => {
                write!(f, "condition cycle: {}", states.join(" -> "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_display() {
        let w = GraphWarning::Cycle {
            states: vec!["A".into(), "B".into()],
        };
        assert_eq!(w.to_string(), "condition cycle: A -> B");

        let w = GraphWarning::UndefinedCondition {
            state: "Гнев".into(),
            condition: "Призрак".into(),
        };
        assert!(w.to_string().contains("Призрак"));
    }

    #[test]
    fn test_config_error_messages() {
        let e = ConfigError::MissingKey("states".into());
        assert!(e.to_string().contains("states"));
        let e = ConfigError::NotAList {
            key: "conditions".into(),
        };
        assert!(e.to_string().contains("must be a list"));
    }
}
