//! Urgency pressure: one scalar summarising how much the system needs to speak.
//!
//! `pressure = min(1, sum(level(s) * weight(s)))`. It is advisory input for
//! the trigger policy, never a decision on its own.

use anima_core::{ActivationStore, PressureConfig, StateGraph};

#[derive(Debug, Clone)]
pub struct PressureModel {
    config: PressureConfig,
}

impl PressureModel {
    pub fn new(config: PressureConfig) -> Self {
        Self { config }
    }

    /// Weight lookup: configured table first, then the graph's own weight,
    /// then the fallback.
    pub fn weight(&self, graph: &StateGraph, name: &str) -> f32 {
        self.config
            .weights
            .get(name)
            .copied()
            .or_else(|| graph.base_weight(name))
            .unwrap_or(self.config.fallback_weight)
    }

    pub fn pressure(&self, store: &ActivationStore) -> f32 {
        let graph = store.graph();
        let total: f32 = store
            .iter()
            .map(|(name, level)| level * self.weight(graph, name))
            .sum();
        total.clamp(0.0, 1.0)
    }
}

impl Default for PressureModel {
    fn default() -> Self {
        Self::new(PressureConfig::default())
    }
}
