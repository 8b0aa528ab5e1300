//! Typed collaborator replies.
//!
//! Replies are validated at the boundary. Every field has a documented
//! default, and wrong-typed fields fall back to it instead of failing the
//! whole reply: a list of names that is not a list is empty, non-string
//! entries are dropped, numbers outside [0, 1] are clamped. Only a reply that
//! contains no JSON object at all is an error.

use anima_core::CollaboratorError;
use anima_memory::{ConceptDraft, ConceptKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

// ============================================================================
// Reply shapes
// ============================================================================

/// Classifier: which states the interlocutor seems to be in.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Classification {
    #[serde(deserialize_with = "names")]
    pub states: Vec<String>,
    #[serde(deserialize_with = "unit_f32")]
    pub confidence: Option<f32>,
    #[serde(deserialize_with = "text")]
    pub reasoning: Option<String>,
}

/// Empathy decision. `deactivate` is accepted for older prompts but never
/// applied: states fade through decay only.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "EmpathyReply")]
pub struct EmpathyDecision {
    pub activate: Vec<String>,
    /// Union of `increase_weight`, `deactivate_or_increase` and `increase`,
    /// first occurrence wins.
    pub increase_weight: Vec<String>,
    pub deactivate: Vec<String>,
    pub reasoning: Option<String>,
}

/// Wire shape of the empathy reply. Every spelling of the reinforce list is
/// its own field, so a reply carrying several of them still parses.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EmpathyReply {
    #[serde(deserialize_with = "names")]
    activate: Vec<String>,
    #[serde(deserialize_with = "names")]
    increase_weight: Vec<String>,
    #[serde(deserialize_with = "names")]
    deactivate_or_increase: Vec<String>,
    #[serde(deserialize_with = "names")]
    increase: Vec<String>,
    #[serde(deserialize_with = "names")]
    deactivate: Vec<String>,
    #[serde(deserialize_with = "text")]
    reasoning: Option<String>,
}

impl From<EmpathyReply> for EmpathyDecision {
    fn from(reply: EmpathyReply) -> Self {
        let mut increase_weight: Vec<String> = Vec::new();
        for name in reply
            .increase_weight
            .into_iter()
            .chain(reply.deactivate_or_increase)
            .chain(reply.increase)
        {
            if !increase_weight.contains(&name) {
                increase_weight.push(name);
            }
        }
        Self {
            activate: reply.activate,
            increase_weight,
            deactivate: reply.deactivate,
            reasoning: reply.reasoning,
        }
    }
}

/// Response-need verdict. Absent or broken means "do not respond".
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResponseNeed {
    #[serde(deserialize_with = "flag")]
    pub respond: bool,
    #[serde(deserialize_with = "names")]
    pub themes: Vec<String>,
    #[serde(deserialize_with = "unit_f32")]
    pub urgency: Option<f32>,
}

/// Delayed re-analysis. `decrease` is parsed and ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Reanalysis {
    #[serde(deserialize_with = "names")]
    pub increase: Vec<String>,
    #[serde(deserialize_with = "names")]
    pub decrease: Vec<String>,
    #[serde(deserialize_with = "text")]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ExtractedConcept {
    #[serde(deserialize_with = "text")]
    name: Option<String>,
    #[serde(rename = "type", deserialize_with = "text")]
    kind: Option<String>,
    #[serde(deserialize_with = "names")]
    associations: Vec<String>,
    #[serde(deserialize_with = "names")]
    emotional_context: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConceptExtraction {
    concepts: Value,
}

// ============================================================================
// Lenient field helpers
// ============================================================================

fn names<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => {
                    let s = s.trim();
                    (!s.is_empty()).then(|| s.to_string())
                }
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

fn unit_f32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f32>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(value
        .as_f64()
        .filter(|v| v.is_finite())
        .map(|v| (v as f32).clamp(0.0, 1.0)))
}

fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::String(s) => matches!(
            s.trim().to_lowercase().as_str(),
            "true" | "yes" | "да" | "1"
        ),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        _ => false,
    })
}

fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

// ============================================================================
// Reply parsing
// ============================================================================

/// Find the JSON object in a reply: raw JSON, a fenced code block, or prose
/// around a single `{...}`.
pub fn parse_json_object(reply: &str) -> Result<Value, CollaboratorError> {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        return Err(CollaboratorError::Empty);
    }

    let candidate = serde_json::from_str::<Value>(trimmed).ok().or_else(|| {
        let start = trimmed.find('{')?;
        let end = trimmed.rfind('}')?;
        if end <= start {
            return None;
        }
        serde_json::from_str::<Value>(&trimmed[start..=end]).ok()
    });

    match candidate {
        Some(value @ Value::Object(_)) => Ok(value),
        Some(other) => Err(CollaboratorError::Malformed(format!(
            "expected a JSON object, got {}",
            kind_of(&other)
        ))),
        None => Err(CollaboratorError::Malformed(format!(
            "no JSON object in reply: {}",
            trimmed.chars().take(120).collect::<String>()
        ))),
    }
}

/// Parse a reply into one of the typed shapes above.
pub fn parse_reply<T: DeserializeOwned>(reply: &str) -> Result<T, CollaboratorError> {
    let value = parse_json_object(reply)?;
    serde_json::from_value(value).map_err(|e| CollaboratorError::Malformed(e.to_string()))
}

/// Generated utterances may come back as plain text or as
/// `{"response": ...}` / `{"text": ...}`.
pub fn parse_generated_text(reply: &str) -> Result<String, CollaboratorError> {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        return Err(CollaboratorError::Empty);
    }
    let Ok(value) = parse_json_object(trimmed) else {
        return Ok(trimmed.to_string());
    };
    ["response", "text"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| CollaboratorError::Malformed("reply carries no text".to_string()))
}

/// Concepts with a usable name and a known type. Unknown types are dropped.
pub fn parse_concepts(reply: &str) -> Result<Vec<ConceptDraft>, CollaboratorError> {
    let extraction: ConceptExtraction = parse_reply(reply)?;
    let Value::Array(items) = extraction.concepts else {
        return Ok(Vec::new());
    };

    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<ExtractedConcept>(item).ok())
        .filter_map(|c| {
            let name = c.name?;
            let Some(kind) = c.kind.as_deref().and_then(ConceptKind::parse) else {
                tracing::debug!("Dropping concept '{}' with type {:?}", name, c.kind);
                return None;
            };
            Some(ConceptDraft {
                name,
                kind,
                associations: c.associations,
                emotional_context: c.emotional_context,
            })
        })
        .collect())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
