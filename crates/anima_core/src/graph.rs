//! State graph: the immutable catalogue of named affective states.
//!
//! Each state lists the states it is conditioned on (its parents). Edges are
//! resolved by name after the whole source is read, so forward references are
//! fine. A condition naming an unknown state, or a loop of conditions, is a
//! data-quality warning: it is logged once at load and the offending edge is
//! left out of every traversal.

use crate::error::{ConfigError, GraphWarning};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

const LIST_KEYS: [&str; 3] = ["states", "состояния", "технологии"];
const NAME_KEYS: [&str; 2] = ["name", "название"];
const CONDITION_KEYS: [&str; 2] = ["conditions", "условия"];
const WEIGHT_KEYS: [&str; 2] = ["weight", "вес"];

/// One state as defined in the source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateDefinition {
    pub name: String,
    /// Parent states, in source order, without duplicates.
    pub conditions: Vec<String>,
    /// Static urgency weight, if the source carries one.
    pub base_weight: Option<f32>,
}

impl StateDefinition {
    pub fn new(name: impl Into<String>, conditions: &[&str]) -> Self {
        Self {
            name: name.into(),
            conditions: conditions.iter().map(|c| c.to_string()).collect(),
            base_weight: None,
        }
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.base_weight = Some(weight);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Open,
    Done,
}

#[derive(Debug, Clone)]
pub struct StateGraph {
    states: Vec<StateDefinition>,
    index: HashMap<String, usize>,
    /// parent name -> direct children, in definition order
    children: HashMap<String, Vec<String>>,
    /// (child, parent) edges closing a cycle
    severed: HashSet<(String, String)>,
    warnings: Vec<GraphWarning>,
}

impl StateGraph {
    /// Load a graph from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let graph = Self::from_json_str(&content)?;
        tracing::info!(
            "Loaded state graph from {} ({} states)",
            path.display(),
            graph.len()
        );
        Ok(graph)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(content)?;
        Self::from_value(&value)
    }

    /// Parse the document shape `{ "<list key>": [ {name, conditions, weight}, ... ] }`.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let root = value
            .as_object()
            .ok_or_else(|| ConfigError::MissingKey(LIST_KEYS[0].to_string()))?;

        let (key, list) = LIST_KEYS
            .iter()
            .find_map(|k| root.get(*k).map(|v| (*k, v)))
            .ok_or_else(|| ConfigError::MissingKey(LIST_KEYS[0].to_string()))?;

        let items = list.as_array().ok_or_else(|| ConfigError::NotAList {
            key: key.to_string(),
        })?;

        let definitions = items
            .iter()
            .enumerate()
            .map(|(index, item)| parse_definition(index, item))
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_definitions(definitions)
    }

    pub fn from_definitions(definitions: Vec<StateDefinition>) -> Result<Self, ConfigError> {
        let mut states = Vec::with_capacity(definitions.len());
        let mut index = HashMap::with_capacity(definitions.len());

        for (i, mut def) in definitions.into_iter().enumerate() {
            if def.name.trim().is_empty() {
                return Err(ConfigError::InvalidState {
                    index: i,
                    reason: "empty name".to_string(),
                });
            }
            if index.contains_key(&def.name) {
                return Err(ConfigError::DuplicateState(def.name));
            }
            let mut seen = HashSet::new();
            def.conditions.retain(|c| seen.insert(c.clone()));
            index.insert(def.name.clone(), i);
            states.push(def);
        }

        let mut graph = Self {
            states,
            index,
            children: HashMap::new(),
            severed: HashSet::new(),
            warnings: Vec::new(),
        };
        graph.resolve();

        for warning in &graph.warnings {
            tracing::warn!("State graph: {}", warning);
        }
        Ok(graph)
    }

    /// Find undefined conditions and cycles, then build the child index from
    /// the remaining edges.
    fn resolve(&mut self) {
        for def in &self.states {
            for cond in &def.conditions {
                if !self.index.contains_key(cond) {
                    self.warnings.push(GraphWarning::UndefinedCondition {
                        state: def.name.clone(),
                        condition: cond.clone(),
                    });
                }
            }
        }

        let mut marks: HashMap<usize, Mark> = HashMap::new();
        let mut path = Vec::new();
        for start in 0..self.states.len() {
            if !marks.contains_key(&start) {
                self.visit(start, &mut marks, &mut path);
            }
        }

        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        for def in &self.states {
            for cond in &def.conditions {
                if self.traversable(&def.name, cond) {
                    children
                        .entry(cond.clone())
                        .or_default()
                        .push(def.name.clone());
                }
            }
        }
        self.children = children;
    }

    fn visit(&mut self, node: usize, marks: &mut HashMap<usize, Mark>, path: &mut Vec<usize>) {
        marks.insert(node, Mark::Open);
        path.push(node);

        let conditions = self.states[node].conditions.clone();
        for cond in conditions {
            let Some(&parent) = self.index.get(&cond) else {
                continue;
            };
            match marks.get(&parent).copied() {
                None => self.visit(parent, marks, path),
                Some(Mark::Open) => {
                    let from = path.iter().position(|&n| n == parent).unwrap_or(0);
                    let states = path[from..]
                        .iter()
                        .map(|&n| self.states[n].name.clone())
                        .collect();
                    self.warnings.push(GraphWarning::Cycle { states });
                    self.severed
                        .insert((self.states[node].name.clone(), cond.clone()));
                }
                Some(Mark::Done) => {}
            }
        }

        path.pop();
        marks.insert(node, Mark::Done);
    }

    fn traversable(&self, child: &str, parent: &str) -> bool {
        self.index.contains_key(parent)
            && !self.severed.contains(&(child.to_string(), parent.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&StateDefinition> {
        self.index.get(name).map(|&i| &self.states[i])
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// State names in definition order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.states.iter().map(|s| s.name.as_str())
    }

    pub fn all_names(&self) -> BTreeSet<&str> {
        self.names().collect()
    }

    pub fn definitions(&self) -> &[StateDefinition] {
        &self.states
    }

    pub fn base_weight(&self, name: &str) -> Option<f32> {
        self.get(name).and_then(|d| d.base_weight)
    }

    pub fn warnings(&self) -> &[GraphWarning] {
        &self.warnings
    }

    /// Direct children: states whose conditions include `name`.
    pub fn children_of(&self, name: &str) -> &[String] {
        self.children.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Transitive closure of `conditions`. Never contains `name` itself.
    pub fn parents_of(&self, name: &str) -> BTreeSet<String> {
        let mut parents = BTreeSet::new();
        let Some(def) = self.get(name) else {
            return parents;
        };

        let mut stack: Vec<(&str, &str)> = def
            .conditions
            .iter()
            .map(|c| (def.name.as_str(), c.as_str()))
            .collect();

        while let Some((child, parent)) = stack.pop() {
            if parent == name || !self.traversable(child, parent) {
                continue;
            }
            if !parents.insert(parent.to_string()) {
                continue;
            }
            if let Some(pdef) = self.get(parent) {
                stack.extend(
                    pdef.conditions
                        .iter()
                        .map(|c| (pdef.name.as_str(), c.as_str())),
                );
            }
        }
        parents
    }

    /// Keep only names defined in this graph, preserving order and dropping repeats.
    pub fn retain_known<I, S>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        names
            .into_iter()
            .filter_map(|n| {
                let n = n.as_ref().trim();
                (self.contains(n) && seen.insert(n.to_string())).then(|| n.to_string())
            })
            .collect()
    }
}

fn field<'a>(
    obj: &'a Map<String, Value>,
    keys: &[&'static str],
) -> Option<(&'static str, &'a Value)> {
    keys.iter().find_map(|k| obj.get(*k).map(|v| (*k, v)))
}

fn parse_definition(index: usize, item: &Value) -> Result<StateDefinition, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidState {
        index,
        reason: reason.to_string(),
    };

    let obj = item.as_object().ok_or_else(|| invalid("not an object"))?;

    let name = match field(obj, &NAME_KEYS) {
        Some((_, Value::String(s))) if !s.trim().is_empty() => s.trim().to_string(),
        Some(_) => return Err(invalid("name must be a non-empty string")),
        None => return Err(invalid("missing name")),
    };

    let conditions = match field(obj, &CONDITION_KEYS) {
        None | Some((_, Value::Null)) => Vec::new(),
        Some((_, Value::Array(items))) => items
            .iter()
            .map(|c| {
                c.as_str()
                    .map(|s| s.trim().to_string())
                    .ok_or_else(|| invalid("conditions must be strings"))
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some((key, _)) => {
            return Err(ConfigError::NotAList {
                key: format!("{}.{}", name, key),
            })
        }
    };

    let base_weight = match field(obj, &WEIGHT_KEYS) {
        None | Some((_, Value::Null)) => None,
        Some((_, Value::Number(n))) => n.as_f64().map(|w| w as f32),
        Some(_) => return Err(invalid("weight must be a number")),
    };

    Ok(StateDefinition {
        name,
        conditions,
        base_weight,
    })
}
