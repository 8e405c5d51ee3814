//! Reason codes for state changes and per-tick decisions

use serde::{Deserialize, Serialize};

/// Reason codes attached to every snapshot and transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum ReasonCode {
    // =========================================================================
    // R001: Input
    // =========================================================================
    /// No spectral peaks this tick (silence or below floor)
    R001_NO_SIGNAL,
    /// Capture is disabled, running on empty spectra
    R001_CAPTURE_DISABLED,

    // =========================================================================
    // R002: Current state
    // =========================================================================
    R002_STATE_FOCUS_12,
    R002_STATE_FOCUS_21,
    /// Operator-selected training mode, metrics do not drive transitions
    R002_STATE_TRAINING,

    // =========================================================================
    // R003: Stability
    // =========================================================================
    /// Variance below threshold, dwell timer running
    R003_STABILITY_ACCUMULATING,
    /// Variance at or above threshold, dwell timer cleared
    R003_STABILITY_RESET,
    /// Dwell reached, time collapse triggered
    R003_STABILITY_REACHED,

    // =========================================================================
    // R004: Gates
    // =========================================================================
    /// Focus 21 blocked: coherence at or below gate
    R004_COHERENCE_BELOW_GATE,
    /// Focus 21 blocked: no harmonic convergence
    R004_CONVERGENCE_ABSENT,
    /// Focus 21 blocked: stability dwell too short
    R004_DWELL_INSUFFICIENT,

    // =========================================================================
    // R005: Transitions
    // =========================================================================
    R005_TRANSITION_TO_FOCUS_15,
    R005_TRANSITION_TO_FOCUS_21,
    /// Operator forced a state
    R005_OPERATOR_OVERRIDE,
    /// Operator reset to Focus 12
    R005_OPERATOR_RESET,
}

impl ReasonCode {
    /// Get the code string (for logging)
    pub fn code(&self) -> &'static str {
        match self {
            Self::R001_NO_SIGNAL => "R001_NO_SIGNAL",
            Self::R001_CAPTURE_DISABLED => "R001_CAPTURE_DISABLED",
            Self::R002_STATE_FOCUS_12 => "R002_STATE_FOCUS_12",
            Self::R002_STATE_FOCUS_21 => "R002_STATE_FOCUS_21",
            Self::R002_STATE_TRAINING => "R002_STATE_TRAINING",
            Self::R003_STABILITY_ACCUMULATING => "R003_STABILITY_ACCUMULATING",
            Self::R003_STABILITY_RESET => "R003_STABILITY_RESET",
            Self::R003_STABILITY_REACHED => "R003_STABILITY_REACHED",
            Self::R004_COHERENCE_BELOW_GATE => "R004_COHERENCE_BELOW_GATE",
            Self::R004_CONVERGENCE_ABSENT => "R004_CONVERGENCE_ABSENT",
            Self::R004_DWELL_INSUFFICIENT => "R004_DWELL_INSUFFICIENT",
            Self::R005_TRANSITION_TO_FOCUS_15 => "R005_TRANSITION_TO_FOCUS_15",
            Self::R005_TRANSITION_TO_FOCUS_21 => "R005_TRANSITION_TO_FOCUS_21",
            Self::R005_OPERATOR_OVERRIDE => "R005_OPERATOR_OVERRIDE",
            Self::R005_OPERATOR_RESET => "R005_OPERATOR_RESET",
        }
    }

    /// Get human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::R001_NO_SIGNAL => "No spectral peaks",
            Self::R001_CAPTURE_DISABLED => "Capture disabled",
            Self::R002_STATE_FOCUS_12 => "Focus 12 - awaiting stability",
            Self::R002_STATE_FOCUS_21 => "Focus 21 - deep resonance",
            Self::R002_STATE_TRAINING => "Training mode - operator driven",
            Self::R003_STABILITY_ACCUMULATING => "Building stability",
            Self::R003_STABILITY_RESET => "Stability reset",
            Self::R003_STABILITY_REACHED => "45-second stability reached",
            Self::R004_COHERENCE_BELOW_GATE => "Coherence below Focus 21 gate",
            Self::R004_CONVERGENCE_ABSENT => "No harmonic convergence",
            Self::R004_DWELL_INSUFFICIENT => "Stability dwell below Focus 21 gate",
            Self::R005_TRANSITION_TO_FOCUS_15 => "Entering Focus 15",
            Self::R005_TRANSITION_TO_FOCUS_21 => "Entering Focus 21",
            Self::R005_OPERATOR_OVERRIDE => "Operator override",
            Self::R005_OPERATOR_RESET => "Operator reset",
        }
    }

    /// True for codes that mark an actual state change
    pub fn is_transition(&self) -> bool {
        self.code().starts_with("R005")
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}
