//! AffectEngine: the per-session owner of activation and the System 1 passes
//! that run over it.
//!
//! The engine is deliberately synchronous. Callers that share it across tasks
//! (the session and its delayed re-analysis) wrap it in a single mutex, so
//! every mutation here happens under one writer.

use crate::pressure::PressureModel;
use crate::propagation::{IterationReport, PropagationEngine};
use crate::trigger::{ResponseSignal, TriggerPhase, TriggerPolicy, TurnDecision};
use anima_core::{
    ActivationConfig, ActivationStore, Bump, PressureConfig, PropagationConfig, StateGraph,
    TriggerConfig,
};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct AffectEngine {
    store: ActivationStore,
    propagation: PropagationEngine,
    pressure: PressureModel,
    trigger: TriggerPolicy,
    phase: TriggerPhase,
}

impl AffectEngine {
    pub fn new(
        graph: Arc<StateGraph>,
        activation: ActivationConfig,
        propagation: PropagationConfig,
        pressure: PressureConfig,
        trigger: TriggerConfig,
    ) -> Self {
        Self {
            store: ActivationStore::new(graph, activation),
            propagation: PropagationEngine::new(propagation),
            pressure: PressureModel::new(pressure),
            trigger: TriggerPolicy::new(trigger),
            phase: TriggerPhase::Idle,
        }
    }

    /// Engine with every tunable at its default.
    pub fn with_defaults(graph: Arc<StateGraph>) -> Self {
        Self::new(
            graph,
            ActivationConfig::default(),
            PropagationConfig::default(),
            PressureConfig::default(),
            TriggerConfig::default(),
        )
    }

    pub fn store(&self) -> &ActivationStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ActivationStore {
        &mut self.store
    }

    pub fn graph(&self) -> &Arc<StateGraph> {
        self.store.graph()
    }

    pub fn phase(&self) -> TriggerPhase {
        self.phase
    }

    pub fn trigger(&self) -> &TriggerPolicy {
        &self.trigger
    }

    // ========================================================================
    // Activation inputs
    // ========================================================================

    /// Apply the empathy decision. `activate` states get a stimulus bump,
    /// `reinforce` states grow only if already active. Returns the names that
    /// actually changed.
    pub fn apply_empathy(&mut self, activate: &[String], reinforce: &[String]) -> Vec<String> {
        let cfg = self.store.config().clone();
        let mut changed = Vec::new();

        for name in activate {
            if self.store.bump(name, cfg.stimulus_increment, Bump::Stimulus) {
                changed.push(name.clone());
            }
        }
        for name in reinforce {
            if self.store.reinforce(name, cfg.reinforce_increment) && !changed.contains(name) {
                changed.push(name.clone());
            }
        }

        tracing::debug!("Empathy touched {:?}", changed);
        changed
    }

    /// Apply a re-analysis `increase` list: each state gets the boost, and each
    /// of its ancestors a share of it.
    pub fn apply_reanalysis(&mut self, increase: &[String]) -> Vec<String> {
        let cfg = self.store.config().clone();
        let graph = self.store.graph().clone();
        let ancestor_boost = cfg.reanalysis_boost * cfg.ancestor_share;
        let mut changed = Vec::new();

        for name in increase {
            if !self.store.bump(name, cfg.reanalysis_boost, Bump::Graded) {
                continue;
            }
            changed.push(name.clone());
            for parent in graph.parents_of(name) {
                let raised = self.store.bump(&parent, ancestor_boost, Bump::Graded);
                if raised && !changed.contains(&parent) {
                    changed.push(parent);
                }
            }
        }

        tracing::info!("Re-analysis raised {:?}", changed);
        changed
    }

    // ========================================================================
    // Per-turn passes
    // ========================================================================

    pub fn propagate(&mut self) -> Vec<IterationReport> {
        self.propagation.run(&mut self.store)
    }

    /// The once-per-turn ambient fade.
    pub fn settle(&mut self) {
        let factor = self.store.config().turn_decay;
        self.store.decay_all(factor);
    }

    /// System 1 for one turn: empathy stimulus, the ambient fade, then
    /// spreading. The fade comes before propagation, so a cascade can still
    /// drive a state to saturation within the turn.
    pub fn react(&mut self, activate: &[String], reinforce: &[String]) -> Vec<IterationReport> {
        self.apply_empathy(activate, reinforce);
        self.settle();
        self.propagate()
    }

    pub fn pressure(&self) -> f32 {
        self.pressure.pressure(&self.store)
    }

    /// Enter `Evaluating` and decide the outcome of the turn.
    pub fn evaluate(&mut self, signal: &ResponseSignal) -> TurnDecision {
        self.phase = TriggerPhase::Evaluating;
        let decision = self.trigger.evaluate(&self.store, self.pressure(), signal);
        self.phase = decision.phase;
        tracing::debug!(
            "Turn decision: {:?} (pressure {:.2}, spontaneous {:?})",
            decision.phase,
            decision.pressure,
            decision.spontaneous
        );
        decision
    }

    /// Saturated states, checked outside a turn (after re-analysis).
    pub fn check_spontaneous(&mut self) -> Vec<String> {
        let fired = self.trigger.saturated(&self.store);
        if !fired.is_empty() {
            self.phase = TriggerPhase::Spontaneous;
        }
        fired
    }

    /// Attenuate after something was said.
    pub fn discharge(&mut self, fired: &[String]) {
        self.trigger.discharge(&mut self.store, fired);
    }

    /// Back to `Idle` for the next message.
    pub fn finish(&mut self) {
        self.phase = TriggerPhase::Idle;
    }

    pub fn snapshot(&self) -> BTreeMap<String, f32> {
        self.store.snapshot()
    }

    pub fn top(&self, n: usize) -> Vec<(String, f32)> {
        self.store.top(n)
    }

    /// Active names strictly above `threshold`, strongest first.
    pub fn active_names(&self, threshold: f32) -> Vec<String> {
        self.store
            .above(threshold)
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anima_core::StateDefinition;

    fn graph() -> Arc<StateGraph> {
        Arc::new(
            StateGraph::from_definitions(vec![
                StateDefinition::new("Пустота", &[]),
                StateDefinition::new("Тревога", &["Пустота"]),
                StateDefinition::new("Гнев", &["Тревога"]),
                StateDefinition::new("Объективизация", &["Гнев"]),
                StateDefinition::new("Сомнение", &["Тревога"]),
            ])
            .unwrap(),
        )
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empathy_activate_and_reinforce() {
        let mut engine = AffectEngine::with_defaults(graph());
        let changed = engine.apply_empathy(&names(&["Тревога", "Призрак"]), &names(&["Гнев"]));
        assert_eq!(changed, names(&["Тревога"]));
        assert!((engine.store().get("Тревога") - 0.7).abs() < 1e-6);
        assert!(!engine.store().contains("Гнев"));

        engine.apply_empathy(&[], &names(&["Тревога"]));
        assert!((engine.store().get("Тревога") - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_reanalysis_reaches_ancestors() {
        let mut engine = AffectEngine::with_defaults(graph());
        let changed = engine.apply_reanalysis(&names(&["Гнев"]));
        assert!((engine.store().get("Гнев") - 0.15).abs() < 1e-6);
        // 0.15 * 0.5 = 0.075 is below epsilon for absent ancestors.
        assert!(!engine.store().contains("Тревога"));
        assert_eq!(changed, names(&["Гнев"]));

        engine.store_mut().bump("Тревога", 0.5, Bump::Graded);
        engine.store_mut().bump("Пустота", 0.5, Bump::Graded);
        engine.apply_reanalysis(&names(&["Гнев"]));
        assert!((engine.store().get("Гнев") - 0.3).abs() < 1e-6);
        assert!((engine.store().get("Тревога") - 0.575).abs() < 1e-6);
        assert!((engine.store().get("Пустота") - 0.575).abs() < 1e-6);
        assert!(!engine.store().contains("Сомнение"));
    }

    #[test]
    fn test_reanalysis_ignores_unknown() {
        let mut engine = AffectEngine::with_defaults(graph());
        assert!(engine.apply_reanalysis(&names(&["Призрак"])).is_empty());
        assert!(engine.store().is_empty());
    }

    #[test]
    fn test_propagate_then_settle() {
        let mut engine = AffectEngine::with_defaults(graph());
        engine.store_mut().bump("Тревога", 0.8, Bump::Graded);
        engine.propagate();
        assert_eq!(engine.store().get("Гнев"), 1.0);
        assert_eq!(engine.store().get("Объективизация"), 0.4);

        engine.settle();
        assert!((engine.store().get("Гнев") - 0.92).abs() < 1e-6);
        assert!((engine.store().get("Тревога") - 0.736).abs() < 1e-6);
    }

    #[test]
    fn test_react_can_saturate_with_defaults() {
        let mut engine = AffectEngine::with_defaults(graph());
        // 0.9 fades to 0.828, children gain 0.414 per iteration and cap at 1.0.
        engine.react(&names(&["Тревога"]), &names(&["Тревога"]));
        assert!((engine.store().get("Тревога") - 0.828).abs() < 1e-6);
        assert_eq!(engine.store().get("Гнев"), 1.0);
        assert_eq!(engine.store().get("Сомнение"), 1.0);

        let decision = engine.evaluate(&ResponseSignal::default());
        assert_eq!(decision.phase, TriggerPhase::Spontaneous);
        assert_eq!(decision.spontaneous, names(&["Гнев", "Сомнение"]));
    }

    #[test]
    fn test_react_fades_before_spreading() {
        let mut engine = AffectEngine::with_defaults(graph());
        engine.react(&names(&["Тревога"]), &[]);
        // 0.7 fades to 0.644 first, so each hop carries 0.322.
        assert!((engine.store().get("Тревога") - 0.644).abs() < 1e-6);
        assert!((engine.store().get("Гнев") - 0.966).abs() < 1e-5);
        assert!(engine.trigger().saturated(engine.store()).is_empty());
    }

    #[test]
    fn test_phase_cycle() {
        let mut engine = AffectEngine::with_defaults(graph());
        assert_eq!(engine.phase(), TriggerPhase::Idle);

        let decision = engine.evaluate(&ResponseSignal {
            respond: true,
            themes: names(&["поддержка"]),
        });
        assert_eq!(decision.phase, TriggerPhase::Responding);
        assert_eq!(engine.phase(), TriggerPhase::Responding);

        engine.finish();
        assert_eq!(engine.phase(), TriggerPhase::Idle);

        let decision = engine.evaluate(&ResponseSignal::default());
        assert_eq!(decision.phase, TriggerPhase::Silent);
    }

    #[test]
    fn test_check_spontaneous_after_saturation() {
        let mut engine = AffectEngine::with_defaults(graph());
        engine.store_mut().bump("Сомнение", 0.9, Bump::Graded);
        assert!(engine.check_spontaneous().is_empty());
        assert_eq!(engine.phase(), TriggerPhase::Idle);

        engine.store_mut().bump("Сомнение", 0.5, Bump::Graded);
        assert_eq!(engine.check_spontaneous(), names(&["Сомнение"]));
        assert_eq!(engine.phase(), TriggerPhase::Spontaneous);

        let fired = engine.check_spontaneous();
        engine.discharge(&fired);
        assert!((engine.store().get("Сомнение") - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_active_names_sorted() {
        let mut engine = AffectEngine::with_defaults(graph());
        engine.store_mut().bump("Гнев", 0.9, Bump::Graded);
        engine.store_mut().bump("Сомнение", 0.5, Bump::Graded);
        engine.store_mut().bump("Пустота", 0.2, Bump::Graded);
        assert_eq!(engine.active_names(0.3), names(&["Гнев", "Сомнение"]));
        assert_eq!(engine.top(1)[0].0, "Гнев");
    }
}
