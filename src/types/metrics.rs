//! Per-tick coherence metrics

use serde::{Deserialize, Serialize};

/// Metrics recomputed from scratch every committed tick
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineMetrics {
    /// [0, 1]
    pub spectral_phase_stability: f64,
    /// [0, 1]
    pub vibrational_coherence: f64,
    /// [0, 1]
    pub golden_ratio_alignment: f64,
    /// >= 0
    pub amplitude_variance: f64,
    /// [0, 1], min(variance * 10, 1)
    pub breath_rhythm: f64,
    pub harmonic_convergence: bool,
}

impl EngineMetrics {
    /// All zero, used for silent ticks
    pub fn zero() -> Self {
        Self::default()
    }

    /// True when no metric carries a NaN or infinity
    pub fn is_finite(&self) -> bool {
        [
            self.spectral_phase_stability,
            self.vibrational_coherence,
            self.golden_ratio_alignment,
            self.amplitude_variance,
            self.breath_rhythm,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}
