//! Trigger policy: respond now, stay silent, or fire spontaneously.
//!
//! Per turn the decision moves `Idle -> Evaluating -> {Responding, Silent,
//! Spontaneous}` and back to `Idle` for the next message. The external
//! "should respond" signal is advisory; the optional pressure floor can veto
//! it. Spontaneous firing is checked independently of the normal response:
//! any state at or above the saturation threshold fires.

use anima_core::{ActivationStore, TriggerConfig};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPhase {
    Idle,
    Evaluating,
    Responding,
    Silent,
    Spontaneous,
}

/// The response-need collaborator's verdict, reduced to what the policy reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseSignal {
    pub respond: bool,
    pub themes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnDecision {
    pub phase: TriggerPhase,
    pub pressure: f32,
    pub themes: Vec<String>,
    /// Saturated states that fire a spontaneous utterance.
    pub spontaneous: Vec<String>,
}

impl TurnDecision {
    pub fn responds(&self) -> bool {
        self.phase == TriggerPhase::Responding
    }

    pub fn fires_spontaneously(&self) -> bool {
        !self.spontaneous.is_empty()
    }

    /// Anything is going to be said this turn.
    pub fn speaks(&self) -> bool {
        self.responds() || self.fires_spontaneously()
    }
}

#[derive(Debug, Clone)]
pub struct TriggerPolicy {
    config: TriggerConfig,
}

impl TriggerPolicy {
    pub fn new(config: TriggerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    pub fn is_saturated(&self, level: f32) -> bool {
        level >= self.config.spontaneous_threshold
    }

    pub fn saturated(&self, store: &ActivationStore) -> Vec<String> {
        store.saturated(self.config.spontaneous_threshold)
    }

    pub fn evaluate(
        &self,
        store: &ActivationStore,
        pressure: f32,
        signal: &ResponseSignal,
    ) -> TurnDecision {
        let themes: Vec<String> = signal
            .themes
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect();

        let vetoed = self
            .config
            .min_pressure
            .map(|floor| pressure < floor)
            .unwrap_or(false);
        if vetoed && signal.respond {
            tracing::debug!(
                "Response vetoed: pressure {:.2} below floor {:?}",
                pressure,
                self.config.min_pressure
            );
        }

        let spontaneous = self.saturated(store);
        let phase = if signal.respond && !themes.is_empty() && !vetoed {
            TriggerPhase::Responding
        } else if !spontaneous.is_empty() {
            TriggerPhase::Spontaneous
        } else {
            TriggerPhase::Silent
        };

        TurnDecision {
            phase,
            pressure,
            themes,
            spontaneous,
        }
    }

    /// Post-utterance catharsis. Trigger states (configured ones plus the
    /// states that `fired`) shrink by the trigger factor, every other active
    /// state by the ambient factor.
    pub fn discharge(&self, store: &mut ActivationStore, fired: &[String]) {
        let hot: HashSet<&str> = self
            .config
            .trigger_states
            .iter()
            .chain(fired)
            .map(String::as_str)
            .collect();

        let (trigger, ambient): (Vec<String>, Vec<String>) = store
            .iter()
            .map(|(name, _)| name.to_string())
            .partition(|name| hot.contains(name.as_str()));

        store.attenuate(&trigger, self.config.trigger_attenuation);
        store.attenuate(&ambient, self.config.ambient_attenuation);
        tracing::debug!(
            "Discharged {} trigger and {} ambient states",
            trigger.len(),
            ambient.len()
        );
    }
}

impl Default for TriggerPolicy {
    fn default() -> Self {
        Self::new(TriggerConfig::default())
    }
}
