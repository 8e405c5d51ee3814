//! FocusStateMachine: forward-only transitions between focus states
//!
//! State transitions:
//! - FOCUS 12 → FOCUS 15: time collapse triggered this tick
//! - FOCUS 15 → FOCUS 21: collapse active AND coherence > 0.9 AND
//!   harmonic convergence AND stable > 120 s
//! - No automatic reverse transitions. Only the operator resets or forces.
//! - CRL training modes are operator-selected and never evaluated.

use crate::config::EngineConfig;
use crate::types::{EngineMetrics, FocusState, ReasonCode, TimeCollapseState, TransitionEvent};
use crate::{FOCUS21_COHERENCE_GATE, FOCUS21_MIN_STABILITY_SECS};

/// Everything the machine observes on one tick
#[derive(Debug, Clone, Copy)]
pub struct FocusInputs {
    pub metrics: EngineMetrics,
    pub collapse: TimeCollapseState,
    /// The tracker's one-shot collapse flag
    pub collapse_triggered: bool,
}

/// Outcome of one evaluation
#[derive(Debug, Clone)]
pub struct FocusDecision {
    pub state: FocusState,
    pub reason: ReasonCode,
    pub transition: Option<TransitionEvent>,
}

/// Focus state machine
#[derive(Debug, Clone)]
pub struct FocusStateMachine {
    state: FocusState,
    /// When current state began, engine clock ms
    state_since_ms: u64,
    coherence_gate: f64,
    min_stability_secs: u64,
    transition_count: u64,
}

impl Default for FocusStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl FocusStateMachine {
    pub fn new() -> Self {
        Self::with_gates(FOCUS21_COHERENCE_GATE, FOCUS21_MIN_STABILITY_SECS)
    }

    pub fn with_gates(coherence_gate: f64, min_stability_secs: u64) -> Self {
        Self {
            state: FocusState::Focus12,
            state_since_ms: 0,
            coherence_gate,
            min_stability_secs,
            transition_count: 0,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::with_gates(config.focus21_coherence_gate, config.focus21_min_stability_secs)
    }

    /// Start in a given state (tests, resumed sessions)
    pub fn with_state(mut self, state: FocusState) -> Self {
        self.state = state;
        self
    }

    /// Evaluate transition rules against this tick's inputs
    pub fn evaluate(&mut self, inputs: &FocusInputs, now_ms: u64) -> FocusDecision {
        let (next, reason) = self.compute_transition(inputs);

        let transition = if next != self.state {
            Some(self.apply(next, reason, now_ms, inputs.metrics))
        } else {
            None
        };

        FocusDecision {
            state: self.state,
            reason,
            transition,
        }
    }

    fn compute_transition(&self, inputs: &FocusInputs) -> (FocusState, ReasonCode) {
        let collapse = &inputs.collapse;
        match self.state {
            FocusState::Focus12 => {
                if inputs.collapse_triggered {
                    (FocusState::Focus15, ReasonCode::R005_TRANSITION_TO_FOCUS_15)
                } else if collapse.stable_since_ms.is_some() {
                    (FocusState::Focus12, ReasonCode::R003_STABILITY_ACCUMULATING)
                } else {
                    (FocusState::Focus12, ReasonCode::R002_STATE_FOCUS_12)
                }
            }

            FocusState::Focus15 => {
                let m = &inputs.metrics;
                if !collapse.active || collapse.stability_duration_secs <= self.min_stability_secs {
                    (FocusState::Focus15, ReasonCode::R004_DWELL_INSUFFICIENT)
                } else if m.vibrational_coherence <= self.coherence_gate {
                    (FocusState::Focus15, ReasonCode::R004_COHERENCE_BELOW_GATE)
                } else if !m.harmonic_convergence {
                    (FocusState::Focus15, ReasonCode::R004_CONVERGENCE_ABSENT)
                } else {
                    (FocusState::Focus21, ReasonCode::R005_TRANSITION_TO_FOCUS_21)
                }
            }

            FocusState::Focus21 => (FocusState::Focus21, ReasonCode::R002_STATE_FOCUS_21),

            training => (training, ReasonCode::R002_STATE_TRAINING),
        }
    }

    fn apply(
        &mut self,
        to: FocusState,
        reason: ReasonCode,
        now_ms: u64,
        metrics: EngineMetrics,
    ) -> TransitionEvent {
        let event = TransitionEvent {
            from: self.state,
            to,
            reason,
            at_ms: now_ms,
            metrics,
        };
        self.state = to;
        self.state_since_ms = now_ms;
        self.transition_count += 1;
        event
    }

    /// Operator override, bypassing every gate. `None` if already there.
    pub fn force(
        &mut self,
        target: FocusState,
        now_ms: u64,
        metrics: EngineMetrics,
    ) -> Option<TransitionEvent> {
        (target != self.state)
            .then(|| self.apply(target, ReasonCode::R005_OPERATOR_OVERRIDE, now_ms, metrics))
    }

    /// Operator reset back to Focus 12
    pub fn reset(&mut self, now_ms: u64, metrics: EngineMetrics) -> Option<TransitionEvent> {
        (self.state != FocusState::Focus12).then(|| {
            self.apply(FocusState::Focus12, ReasonCode::R005_OPERATOR_RESET, now_ms, metrics)
        })
    }

    pub fn state(&self) -> FocusState {
        self.state
    }

    pub fn state_since_ms(&self) -> u64 {
        self.state_since_ms
    }

    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }
}

// =============================================================================
// TESTS
// =============================================================================
