//! Spreading activation along condition edges.
//!
//! An active state makes its downstream consequences (children) more likely.
//! Each hop scales influence by `hop_decay`; influences from several parents
//! add up. The loop runs a fixed number of iterations and each iteration reads
//! the store as left by the previous one, so activation can cascade several
//! hops per turn. Deep graphs are not guaranteed to settle within one turn.

use anima_core::{ActivationStore, Bump, PropagationConfig};
use std::collections::BTreeMap;

/// What one iteration did, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IterationReport {
    /// Accumulated influence per child, before thresholding.
    pub influence: BTreeMap<String, f32>,
    /// Children that were absent and have been created.
    pub created: Vec<String>,
    /// Children whose influence was too weak to create them.
    pub discarded: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PropagationEngine {
    config: PropagationConfig,
}

impl PropagationEngine {
    pub fn new(config: PropagationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PropagationConfig {
        &self.config
    }

    /// Run the configured number of iterations.
    pub fn run(&self, store: &mut ActivationStore) -> Vec<IterationReport> {
        (0..self.config.iterations)
            .map(|i| {
                let report = self.step(store);
                tracing::debug!(
                    "Propagation iteration {}: influenced {:?}, created {:?}",
                    i + 1,
                    report.influence.keys().collect::<Vec<_>>(),
                    report.created
                );
                report
            })
            .collect()
    }

    /// One iteration: gather influence from a snapshot, then apply it.
    pub fn step(&self, store: &mut ActivationStore) -> IterationReport {
        let graph = store.graph().clone();
        let mut influence: BTreeMap<String, f32> = BTreeMap::new();

        for (parent, level) in store.iter() {
            if level < self.config.activity_floor {
                continue;
            }
            for child in graph.children_of(parent) {
                let acc = influence.entry(child.clone()).or_insert(0.0);
                *acc = (*acc + level * self.config.hop_decay).min(1.0);
            }
        }

        let mut report = IterationReport::default();
        for (child, value) in &influence {
            if store.contains(child) {
                store.bump(child, *value, Bump::Graded);
            } else if *value > self.config.creation_threshold {
                if store.bump(child, *value, Bump::Graded) {
                    report.created.push(child.clone());
                }
            } else {
                report.discarded.push(child.clone());
            }
        }
        report.influence = influence;
        report
    }
}

impl Default for PropagationEngine {
    fn default() -> Self {
        Self::new(PropagationConfig::default())
    }
}
