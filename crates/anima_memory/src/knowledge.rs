//! Knowledge store: a flat list of concepts extracted from dialogue.
//!
//! The whole store lives in one JSON document
//! (`{"concepts": [...], "relations": [...], "created_at": ...}`) that is
//! rewritten after every non-empty batch. Lookups are linear; the store is
//! small and grows by a handful of concepts per exchange.
//!
//! Loading is per concept: an entry with an unknown `type` or a missing name
//! is kept verbatim and written back untouched, but takes no part in lookups.
//! Timestamps may be RFC 3339 or naive ISO 8601 (read as UTC).

use anima_core::StorageError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConceptKind {
    Event,
    Object,
    Emotion,
    Temporal,
}

impl ConceptKind {
    /// Lenient parse of the extractor's `type` field.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "event" | "событие" => Some(Self::Event),
            "object" | "объект" => Some(Self::Object),
            "emotion" | "эмоция" => Some(Self::Emotion),
            "temporal" | "время" => Some(Self::Temporal),
            _ => None,
        }
    }
}

/// A concept as produced by extraction, before it gets an id.
#[derive(Debug, Clone, PartialEq)]
pub struct ConceptDraft {
    pub name: String,
    pub kind: ConceptKind,
    pub associations: Vec<String>,
    pub emotional_context: Vec<String>,
}

impl ConceptDraft {
    pub fn new(name: impl Into<String>, kind: ConceptKind) -> Self {
        Self {
            name: name.into(),
            kind,
            associations: Vec::new(),
            emotional_context: Vec::new(),
        }
    }

    pub fn with_associations(mut self, associations: &[&str]) -> Self {
        self.associations = associations.iter().map(|s| s.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", deserialize_with = "concept_kind")]
    pub kind: ConceptKind,
    #[serde(default)]
    pub associations: Vec<String>,
    #[serde(default)]
    pub emotional_context: Vec<String>,
    #[serde(default = "Utc::now", deserialize_with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_source() -> String {
    "dialogue".to_string()
}

fn concept_kind<'de, D: Deserializer<'de>>(d: D) -> Result<ConceptKind, D::Error> {
    let raw = String::deserialize(d)?;
    ConceptKind::parse(&raw)
        .ok_or_else(|| D::Error::custom(format!("unknown concept type '{}'", raw)))
}

fn timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(value
        .as_str()
        .and_then(parse_timestamp)
        .unwrap_or_else(Utc::now))
}

/// RFC 3339, or a naive `YYYY-MM-DDTHH:MM:SS[.f]` taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// On-disk shape, read before concepts are checked one by one.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDocument {
    concepts: Vec<Value>,
    relations: Vec<Value>,
    created_at: Value,
}

#[derive(Serialize)]
struct DocumentOut<'a> {
    concepts: Vec<Value>,
    relations: &'a [Value],
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct KnowledgeDocument {
    concepts: Vec<ConceptNode>,
    /// Entries that did not parse as concepts, preserved as read.
    unreadable: Vec<Value>,
    relations: Vec<Value>,
    created_at: DateTime<Utc>,
}

impl Default for KnowledgeDocument {
    fn default() -> Self {
        Self {
            concepts: Vec::new(),
            unreadable: Vec::new(),
            relations: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

impl KnowledgeDocument {
    fn parse(content: &str) -> Result<Self, StorageError> {
        let raw: RawDocument = serde_json::from_str(content)?;
        let mut concepts = Vec::with_capacity(raw.concepts.len());
        let mut unreadable = Vec::new();
        for entry in raw.concepts {
            match serde_json::from_value::<ConceptNode>(entry.clone()) {
                Ok(node) => concepts.push(node),
                Err(e) => {
                    tracing::warn!("Keeping unreadable concept aside: {}", e);
                    unreadable.push(entry);
                }
            }
        }
        Ok(Self {
            concepts,
            unreadable,
            relations: raw.relations,
            created_at: raw
                .created_at
                .as_str()
                .and_then(parse_timestamp)
                .unwrap_or_else(Utc::now),
        })
    }

    /// Ids count every entry, readable or not.
    fn next_id(&self) -> String {
        format!("concept_{:04}", self.concepts.len() + self.unreadable.len())
    }

    fn to_value(&self) -> Result<Value, serde_json::Error> {
        let mut concepts = self
            .concepts
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        concepts.extend(self.unreadable.iter().cloned());
        serde_json::to_value(DocumentOut {
            concepts,
            relations: &self.relations,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct KnowledgeStore {
    path: Option<PathBuf>,
    document: KnowledgeDocument,
}

impl KnowledgeStore {
    /// Open the store at `path`. A missing file yields an empty store; the
    /// file is created on the first write.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let document = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let document = KnowledgeDocument::parse(&content)?;
            tracing::info!(
                "Loaded {} concepts from {} ({} unreadable)",
                document.concepts.len(),
                path.display(),
                document.unreadable.len()
            );
            document
        } else {
            tracing::info!("No knowledge store at {}, starting empty", path.display());
            KnowledgeDocument::default()
        };
        Ok(Self {
            path: Some(path),
            document,
        })
    }

    /// A store that is never persisted.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            document: KnowledgeDocument::default(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.document.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document.concepts.is_empty()
    }

    pub fn concepts(&self) -> &[ConceptNode] {
        &self.document.concepts
    }

    /// Append drafts with sequential ids and persist the full store.
    ///
    /// Returns the number of concepts added. On a write error the concepts
    /// stay in memory and the error is returned for logging.
    pub fn add_concepts(&mut self, drafts: Vec<ConceptDraft>) -> Result<usize, StorageError> {
        let mut added = 0;
        for draft in drafts {
            let name = draft.name.trim();
            if name.is_empty() {
                continue;
            }
            let node = ConceptNode {
                id: self.document.next_id(),
                name: name.to_string(),
                kind: draft.kind,
                associations: draft.associations,
                emotional_context: draft.emotional_context,
                created_at: Utc::now(),
                source: default_source(),
            };
            self.document.concepts.push(node);
            added += 1;
        }

        if added > 0 {
            tracing::info!("Added {} concepts to the knowledge store", added);
            self.persist()?;
        }
        Ok(added)
    }

    /// Case-insensitive substring match on names and associations, in
    /// insertion order, at most `limit` names.
    pub fn find_related(&self, query: &str, limit: usize) -> Vec<String> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        self.document
            .concepts
            .iter()
            .filter(|c| {
                c.name.to_lowercase().contains(&query)
                    || c.associations
                        .iter()
                        .any(|a| a.to_lowercase().contains(&query))
            })
            .map(|c| c.name.clone())
            .take(limit)
            .collect()
    }

    fn persist(&self) -> Result<(), StorageError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.document.to_value()?)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drafts() -> Vec<ConceptDraft> {
        vec![
            ConceptDraft::new("Работа", ConceptKind::Object).with_associations(&["начальник", "офис"]),
            ConceptDraft::new("Увольнение", ConceptKind::Event).with_associations(&["работа"]),
            ConceptDraft::new("Вечер", ConceptKind::Temporal),
        ]
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(ConceptKind::parse("Event"), Some(ConceptKind::Event));
        assert_eq!(ConceptKind::parse(" emotion "), Some(ConceptKind::Emotion));
        assert_eq!(ConceptKind::parse("event/object"), None);
    }

    #[test]
    fn test_sequential_ids() {
        let mut store = KnowledgeStore::in_memory();
        assert_eq!(store.add_concepts(drafts()).unwrap(), 3);
        store
            .add_concepts(vec![ConceptDraft::new("Кот", ConceptKind::Object)])
            .unwrap();
        let ids: Vec<&str> = store.concepts().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["concept_0000", "concept_0001", "concept_0002", "concept_0003"]);
        assert_eq!(store.concepts()[0].source, "dialogue");
    }

    #[test]
    fn test_blank_names_skipped() {
        let mut store = KnowledgeStore::in_memory();
        let added = store
            .add_concepts(vec![ConceptDraft::new("  ", ConceptKind::Event)])
            .unwrap();
        assert_eq!(added, 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_find_related_matches_names_and_associations() {
        let mut store = KnowledgeStore::in_memory();
        store.add_concepts(drafts()).unwrap();
        assert_eq!(store.find_related("РАБОТ", 5), vec!["Работа", "Увольнение"]);
        assert_eq!(store.find_related("офис", 5), vec!["Работа"]);
        assert_eq!(store.find_related("работ", 1), vec!["Работа"]);
        assert!(store.find_related("", 5).is_empty());
        assert!(store.find_related("море", 5).is_empty());
    }

    #[test]
    fn test_find_related_caps_results() {
        let mut store = KnowledgeStore::in_memory();
        let many = (0..8)
            .map(|i| ConceptDraft::new(format!("День {}", i), ConceptKind::Temporal))
            .collect();
        store.add_concepts(many).unwrap();
        assert_eq!(store.find_related("день", 5).len(), 5);
    }

    #[test]
    fn test_document_shape() {
        let mut store = KnowledgeStore::in_memory();
        store.add_concepts(drafts()).unwrap();
        let value = store.document.to_value().unwrap();
        assert!(value["concepts"].is_array());
        assert!(value["relations"].is_array());
        assert!(value["created_at"].is_string());
        assert_eq!(value["concepts"][0]["type"], "object");
    }
}
