//! # Anima Limbic (System 1)
//!
//! The fast, non-verbal half of the engine. Everything here is synchronous
//! arithmetic over an [`anima_core::ActivationStore`]:
//!
//! - **Propagation**: activation spreads from states to their consequences,
//!   halving per hop, for a fixed number of iterations.
//! - **Pressure**: a weighted sum of activations, capped at 1.
//! - **Trigger policy**: respond / stay silent / fire spontaneously, plus the
//!   post-utterance discharge.
//!
//! [`AffectEngine`] bundles the three around one store. Language-model calls
//! and persistence live in `anima_reasoning` and `anima_memory`.

mod engine;
mod pressure;
mod propagation;
mod trigger;

pub use engine::AffectEngine;
pub use pressure::PressureModel;
pub use propagation::{IterationReport, PropagationEngine};
pub use trigger::{ResponseSignal, TriggerPhase, TriggerPolicy, TurnDecision};
