//! Property-based tests for anima_limbic propagation, pressure and discharge.
//!
//! Random operation sequences over a small layered graph must keep every
//! activation within [0, 1], pressure within [0, 1], and propagation must
//! never conjure a child from influence at or below the creation threshold.

use anima_core::{ActivationConfig, ActivationStore, Bump, StateDefinition, StateGraph};
use anima_limbic::{AffectEngine, PressureModel, PropagationEngine, ResponseSignal, TriggerPolicy};
use proptest::prelude::*;
use std::sync::Arc;

const NAMES: &[&str] = &[
    "Пустота",
    "Тревога",
    "Гнев",
    "Сомнение",
    "Объективизация",
    "Вывод",
];

fn graph() -> Arc<StateGraph> {
    Arc::new(
        StateGraph::from_definitions(vec![
            StateDefinition::new("Пустота", &[]),
            StateDefinition::new("Тревога", &["Пустота"]),
            StateDefinition::new("Гнев", &["Тревога"]),
            StateDefinition::new("Сомнение", &["Тревога", "Пустота"]),
            StateDefinition::new("Объективизация", &["Гнев", "Сомнение"]),
            StateDefinition::new("Вывод", &["Объективизация"]),
        ])
        .unwrap(),
    )
}

// ============================================================================
// Strategies
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Empathy(usize),
    Graded(usize, f32),
    Reanalysis(usize),
    Propagate,
    Settle,
    Discharge,
}

fn arb_op() -> impl Strategy<Value = Op> {
    let idx = 0..NAMES.len();
    prop_oneof![
        idx.clone().prop_map(Op::Empathy),
        (idx.clone(), -1.0f32..=1.0).prop_map(|(i, d)| Op::Graded(i, d)),
        idx.prop_map(Op::Reanalysis),
        Just(Op::Propagate),
        Just(Op::Settle),
        Just(Op::Discharge),
    ]
}

fn assert_bounded(store: &ActivationStore) -> Result<(), TestCaseError> {
    for (name, level) in store.iter() {
        prop_assert!(
            (0.0..=1.0).contains(&level),
            "{} out of bounds: {}",
            name,
            level
        );
        prop_assert!(level >= store.config().epsilon, "{} below epsilon", name);
    }
    Ok(())
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn engine_levels_stay_bounded(ops in prop::collection::vec(arb_op(), 1..60)) {
        let mut engine = AffectEngine::with_defaults(graph());
        for op in ops {
            match op {
                Op::Empathy(i) => {
                    engine.apply_empathy(&[NAMES[i].to_string()], &[NAMES[i].to_string()]);
                }
                Op::Graded(i, d) => {
                    engine.store_mut().bump(NAMES[i], d, Bump::Graded);
                }
                Op::Reanalysis(i) => {
                    engine.apply_reanalysis(&[NAMES[i].to_string()]);
                }
                Op::Propagate => {
                    engine.propagate();
                }
                Op::Settle => engine.settle(),
                Op::Discharge => {
                    let fired = engine.check_spontaneous();
                    engine.discharge(&fired);
                }
            }
            assert_bounded(engine.store())?;
            let p = engine.pressure();
            prop_assert!((0.0..=1.0).contains(&p), "pressure out of bounds: {}", p);
        }
    }

    #[test]
    fn propagation_respects_creation_threshold(
        levels in prop::collection::vec(0.0f32..=1.0, NAMES.len()),
    ) {
        let mut store = ActivationStore::new(graph(), ActivationConfig::default());
        for (name, level) in NAMES.iter().zip(&levels) {
            store.bump(name, *level, Bump::Graded);
        }
        let before = store.snapshot();

        let engine = PropagationEngine::default();
        let report = engine.step(&mut store);

        for created in &report.created {
            prop_assert!(!before.contains_key(created));
            let influence = report.influence[created];
            prop_assert!(influence > engine.config().creation_threshold);
        }
        for name in NAMES {
            if !before.contains_key(*name) && store.contains(name) {
                prop_assert!(report.created.iter().any(|c| c == name));
            }
        }
        assert_bounded(&store)?;
    }

    #[test]
    fn propagation_never_lowers_levels(
        levels in prop::collection::vec(0.0f32..=1.0, NAMES.len()),
    ) {
        let mut store = ActivationStore::new(graph(), ActivationConfig::default());
        for (name, level) in NAMES.iter().zip(&levels) {
            store.bump(name, *level, Bump::Graded);
        }
        let before = store.snapshot();
        PropagationEngine::default().run(&mut store);
        for (name, level) in before {
            prop_assert!(store.get(&name) >= level);
        }
    }

    #[test]
    fn pressure_is_bounded(levels in prop::collection::vec(0.0f32..=1.0, NAMES.len())) {
        let mut store = ActivationStore::new(graph(), ActivationConfig::default());
        for (name, level) in NAMES.iter().zip(&levels) {
            store.bump(name, *level, Bump::Graded);
        }
        let p = PressureModel::default().pressure(&store);
        prop_assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn silence_without_themes(respond in any::<bool>(), level in 0.0f32..0.99) {
        let mut store = ActivationStore::new(graph(), ActivationConfig::default());
        store.bump("Гнев", level, Bump::Graded);
        let decision = TriggerPolicy::default().evaluate(
            &store,
            0.5,
            &ResponseSignal { respond, themes: Vec::new() },
        );
        prop_assert!(!decision.speaks());
    }
}
