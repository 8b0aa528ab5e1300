use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnimaConfig {
    pub llm: LlmConfig,
    pub graph: GraphConfig,
    pub activation: ActivationConfig,
    pub propagation: PropagationConfig,
    pub pressure: PressureConfig,
    pub trigger: TriggerConfig,
    pub memory: MemoryConfig,
    pub session: SessionConfig,
}

impl AnimaConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: AnimaConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if file doesn't exist, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LLM_PROVIDER") {
            self.llm.provider = v;
        }
        if let Ok(v) = std::env::var("LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("LLM_MAX_TOKENS") {
            if let Ok(n) = v.parse() {
                self.llm.max_tokens = n;
            }
        }
        if let Ok(v) = std::env::var("LLM_TEMPERATURE") {
            if let Ok(n) = v.parse() {
                self.llm.temperature = n;
            }
        }
        if let Ok(v) = std::env::var("ANIMA_GRAPH") {
            self.graph.path = PathBuf::from(v);
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// "openai" (any OpenAI-compatible endpoint) or "mock".
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            base_url: None,
            max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub path: PathBuf,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("mind1.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ActivationConfig {
    /// Level a state jumps to on its first stimulus activation.
    pub base_level: f32,
    /// Increment for a stimulus bump on an already-active state.
    pub stimulus_increment: f32,
    /// Increment for `reinforce` (already-active states only).
    pub reinforce_increment: f32,
    /// Increment applied by delayed re-analysis.
    pub reanalysis_boost: f32,
    /// Share of a re-analysis boost passed on to every ancestor.
    pub ancestor_share: f32,
    /// Entries below this level are dropped.
    pub epsilon: f32,
    /// Ambient multiplicative decay, applied once per turn.
    pub turn_decay: f32,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            base_level: 0.7,
            stimulus_increment: 0.4,
            reinforce_increment: 0.2,
            reanalysis_boost: 0.15,
            ancestor_share: 0.5,
            epsilon: 0.1,
            turn_decay: 0.92,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PropagationConfig {
    pub iterations: usize,
    /// Fraction of a parent's activation that reaches each child per hop.
    pub hop_decay: f32,
    /// A not-yet-active child is created only above this influence.
    pub creation_threshold: f32,
    /// Parents below this level do not propagate.
    pub activity_floor: f32,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            iterations: 3,
            hop_decay: 0.5,
            creation_threshold: 0.2,
            activity_floor: 0.1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PressureConfig {
    pub weights: HashMap<String, f32>,
    /// Weight for states that are neither in `weights` nor carry a graph weight.
    pub fallback_weight: f32,
}

impl Default for PressureConfig {
    fn default() -> Self {
        let weights = [
            ("Гнев", 0.9),
            ("Уточнение", 0.7),
            ("Вывод", 0.8),
            ("Признание", 0.7),
            ("Сомнение", 0.3),
            ("О грёзах", 0.1),
            ("Тревога", 0.6),
            ("Сожаление", 0.4),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self {
            weights,
            fallback_weight: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// A state at or above this level fires a spontaneous utterance.
    pub spontaneous_threshold: f32,
    /// States representing unresolved pressure; discharged harder after speaking.
    pub trigger_states: Vec<String>,
    pub trigger_attenuation: f32,
    pub ambient_attenuation: f32,
    /// Engine-side veto: stay silent below this pressure even if asked to respond.
    pub min_pressure: Option<f32>,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            spontaneous_threshold: 1.0,
            trigger_states: ["Уточнение", "Вывод", "Признание", "Гнев", "Сомнение"]
                .into_iter()
                .map(String::from)
                .collect(),
            trigger_attenuation: 0.4,
            ambient_attenuation: 0.7,
            min_pressure: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub archive_capacity: usize,
    /// Only states above this level make it into an archived snapshot.
    pub significance: f32,
    pub knowledge_path: Option<PathBuf>,
    pub journal_path: Option<PathBuf>,
    pub journal_tail_lines: usize,
    pub related_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            archive_capacity: 5,
            significance: 0.3,
            knowledge_path: Some(PathBuf::from("world_model.json")),
            journal_path: Some(PathBuf::from("analyze.txt")),
            journal_tail_lines: 20,
            related_limit: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub reanalysis_delay_secs: f64,
    /// Number of trailing history items handed to collaborators.
    pub history_window: usize,
    pub top_states: usize,
    pub fallback_response: String,
    pub fallback_spontaneous: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reanalysis_delay_secs: 5.0,
            history_window: 2,
            top_states: 3,
            fallback_response: "Я понимаю тебя...".to_string(),
            fallback_spontaneous: "...".to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = AnimaConfig::default();
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.propagation.iterations, 3);
        assert_eq!(cfg.memory.archive_capacity, 5);
        assert_eq!(cfg.trigger.spontaneous_threshold, 1.0);
        assert_eq!(cfg.pressure.weights.get("Гнев"), Some(&0.9));
        assert!(cfg.trigger.min_pressure.is_none());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[llm]
provider = "mock"

[propagation]
hop_decay = 0.4
"#;
        let cfg: AnimaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.llm.provider, "mock");
        assert!((cfg.propagation.hop_decay - 0.4).abs() < 1e-6);
        // Defaults for unspecified fields
        assert_eq!(cfg.propagation.iterations, 3);
        assert!((cfg.activation.base_level - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[llm]
provider = "openai"
model = "gpt-4o-mini"
base_url = "https://api.proxyapi.ru/openai/v1"
max_tokens = 512
temperature = 0.5

[graph]
path = "data/mind.json"

[activation]
base_level = 0.6
turn_decay = 0.9

[pressure]
fallback_weight = 0.25
weights = { "Гнев" = 1.0 }

[trigger]
trigger_states = ["Гнев"]
min_pressure = 0.2

[memory]
archive_capacity = 8
journal_path = "logs/analyze.txt"

[session]
reanalysis_delay_secs = 1.5
"#;
        let cfg: AnimaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.llm.max_tokens, 512);
        assert_eq!(cfg.graph.path, PathBuf::from("data/mind.json"));
        assert!((cfg.activation.turn_decay - 0.9).abs() < 1e-6);
        assert_eq!(cfg.pressure.weights.len(), 1);
        assert_eq!(cfg.trigger.trigger_states, vec!["Гнев".to_string()]);
        assert_eq!(cfg.trigger.min_pressure, Some(0.2));
        assert_eq!(cfg.memory.archive_capacity, 8);
        assert_eq!(cfg.memory.journal_path, Some(PathBuf::from("logs/analyze.txt")));
        assert!((cfg.session.reanalysis_delay_secs - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_env_overrides_and_defaults() {
        std::env::set_var("LLM_PROVIDER", "mock");
        std::env::set_var("ANIMA_GRAPH", "/tmp/graph.json");

        let mut cfg = AnimaConfig::default();
        cfg.apply_env_overrides();

        assert_eq!(cfg.llm.provider, "mock");
        assert_eq!(cfg.graph.path, PathBuf::from("/tmp/graph.json"));

        std::env::remove_var("LLM_PROVIDER");
        std::env::remove_var("ANIMA_GRAPH");

        let cfg = AnimaConfig::load_or_default("/nonexistent/path.toml");
        assert_eq!(cfg.llm.provider, "openai");
    }
}
