//! Activation store: per-session mapping from state name to level in [0, 1].
//!
//! Absence means zero. Entries below `epsilon` are removed by every
//! operation, so presence only ever means "level >= epsilon".

use crate::config::ActivationConfig;
use crate::graph::StateGraph;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// How a bump treats a state that is not active yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bump {
    /// Classifier / empathy activation: a new entry jumps to the base level,
    /// an existing one grows by `delta`.
    Stimulus,
    /// Propagation and re-analysis: a new entry starts at `delta`.
    Graded,
}

#[derive(Debug, Clone)]
pub struct ActivationStore {
    graph: Arc<StateGraph>,
    levels: HashMap<String, f32>,
    config: ActivationConfig,
}

impl ActivationStore {
    pub fn new(graph: Arc<StateGraph>, config: ActivationConfig) -> Self {
        Self {
            graph,
            levels: HashMap::new(),
            config,
        }
    }

    pub fn graph(&self) -> &Arc<StateGraph> {
        &self.graph
    }

    pub fn config(&self) -> &ActivationConfig {
        &self.config
    }

    pub fn get(&self, name: &str) -> f32 {
        self.levels.get(name).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.levels.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.levels.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Raise `name` by `delta`. Names unknown to the graph are ignored.
    /// Returns whether the store changed.
    pub fn bump(&mut self, name: &str, delta: f32, mode: Bump) -> bool {
        if !delta.is_finite() {
            return false;
        }
        if !self.graph.contains(name) {
            tracing::debug!("Ignoring bump of unknown state '{}'", name);
            return false;
        }

        let next = match (self.levels.get(name), mode) {
            (Some(current), _) => current + delta,
            (None, Bump::Stimulus) => self.config.base_level,
            (None, Bump::Graded) => delta,
        };
        self.set(name, next)
    }

    /// Raise an already-active state. Inactive or unknown states are left alone.
    pub fn reinforce(&mut self, name: &str, delta: f32) -> bool {
        match self.levels.get(name).copied() {
            Some(current) if delta.is_finite() => self.set(name, current + delta),
            _ => false,
        }
    }

    /// Multiply every entry by `factor`, dropping those that fall below epsilon.
    pub fn decay_all(&mut self, factor: f32) {
        let factor = sanitize_factor(factor);
        let epsilon = self.config.epsilon;
        self.levels.retain(|_, level| {
            *level *= factor;
            *level >= epsilon
        });
    }

    /// Multiply only the named entries by `factor`.
    pub fn attenuate<I, S>(&mut self, names: I, factor: f32)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let factor = sanitize_factor(factor);
        for name in names {
            let name = name.as_ref();
            if let Some(level) = self.levels.get(name).copied() {
                self.set(name, level * factor);
            }
        }
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.levels.clear();
    }

    pub fn snapshot(&self) -> BTreeMap<String, f32> {
        self.levels
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    /// Entries strictly above `threshold`, strongest first.
    pub fn above(&self, threshold: f32) -> Vec<(String, f32)> {
        let mut out: Vec<(String, f32)> = self
            .levels
            .iter()
            .filter(|(_, v)| **v > threshold)
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        sort_desc(&mut out);
        out
    }

    /// The `n` strongest entries.
    pub fn top(&self, n: usize) -> Vec<(String, f32)> {
        let mut out = self.above(f32::NEG_INFINITY);
        out.truncate(n);
        out
    }

    /// Names at or above `threshold`, sorted by name.
    pub fn saturated(&self, threshold: f32) -> Vec<String> {
        let mut out: Vec<String> = self
            .levels
            .iter()
            .filter(|(_, v)| **v >= threshold)
            .map(|(k, _)| k.clone())
            .collect();
        out.sort();
        out
    }

    /// Human-readable `name (level)` list, strongest first.
    pub fn describe(&self, threshold: f32) -> String {
        self.above(threshold)
            .iter()
            .map(|(name, level)| format!("{} ({:.2})", name, level))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn set(&mut self, name: &str, level: f32) -> bool {
        let level = level.clamp(0.0, 1.0);
        if level < self.config.epsilon {
            return self.levels.remove(name).is_some();
        }
        self.levels.insert(name.to_string(), level);
        true
    }
}

fn sanitize_factor(factor: f32) -> f32 {
    if factor.is_finite() {
        factor.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn sort_desc(entries: &mut [(String, f32)]) {
    entries.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
}
