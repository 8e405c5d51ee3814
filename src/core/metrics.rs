//! MetricsComputer: peaks + amplitude history → EngineMetrics
//!
//! Every metric is recomputed from the current peaks. The only carried
//! state is the bounded amplitude history behind variance/breath rhythm.

use std::f64::consts::PI;

use crate::types::{BoundedHistory, EngineMetrics, SpectralPeaks};
use crate::{
    AMPLITUDE_HISTORY_CAP, CONVERGENCE_COHERENCE_GATE, CONVERGENCE_PHASE_GATE, GOLDEN_RATIO,
    GOLDEN_TOLERANCE, HARMONIC_TOLERANCE,
};

/// Stateful metric computer
#[derive(Debug, Clone)]
pub struct MetricsComputer {
    amplitude_history: BoundedHistory<f64>,
}

impl Default for MetricsComputer {
    fn default() -> Self {
        Self::new(AMPLITUDE_HISTORY_CAP)
    }
}

impl MetricsComputer {
    pub fn new(history_cap: usize) -> Self {
        Self {
            amplitude_history: BoundedHistory::new(history_cap),
        }
    }

    /// Compute this tick's metrics.
    ///
    /// A silent tick (no peaks) yields all-zero metrics and leaves the
    /// amplitude history untouched.
    pub fn compute(&mut self, peaks: &SpectralPeaks) -> EngineMetrics {
        let Some(mean_amplitude) = peaks.mean_amplitude() else {
            return EngineMetrics::zero();
        };

        let spectral_phase_stability = spectral_phase_stability(peaks);
        let vibrational_coherence = vibrational_coherence(peaks);
        let golden_ratio_alignment = golden_ratio_alignment(peaks);

        self.amplitude_history.push(mean_amplitude);
        let amplitude_variance = self.amplitude_history.successive_variance();
        let breath_rhythm = (amplitude_variance * 10.0).min(1.0);

        EngineMetrics {
            spectral_phase_stability,
            vibrational_coherence,
            golden_ratio_alignment,
            amplitude_variance,
            breath_rhythm,
            harmonic_convergence: harmonic_convergence(vibrational_coherence, spectral_phase_stability),
        }
    }

    pub fn amplitude_history(&self) -> &BoundedHistory<f64> {
        &self.amplitude_history
    }

    pub fn reset(&mut self) {
        self.amplitude_history.clear();
    }
}

/// Mean phase agreement of consecutive peaks, in detection order.
///
/// Pairs with equal frequency contribute 0 but still count. 0 with < 3 peaks.
pub fn spectral_phase_stability(peaks: &SpectralPeaks) -> f64 {
    let peaks = peaks.as_slice();
    if peaks.len() < 3 {
        return 0.0;
    }

    let stability: f64 = peaks
        .windows(2)
        .filter(|pair| (pair[1].frequency - pair[0].frequency).abs() > 0.0)
        .map(|pair| 1.0 - ((pair[1].phase - pair[0].phase).abs() / PI).min(1.0))
        .sum();

    stability / (peaks.len() - 1) as f64
}

/// Amplitude-weighted share of peaks sitting on integer harmonics of the
/// lowest positive frequency
pub fn vibrational_coherence(peaks: &SpectralPeaks) -> f64 {
    let fundamental = peaks
        .iter()
        .map(|p| p.frequency)
        .filter(|f| *f > 0.0)
        .fold(f64::INFINITY, f64::min);
    if !fundamental.is_finite() {
        return 0.0;
    }

    let mut harmonic_score = 0.0;
    let mut total_amplitude = 0.0;
    for peak in peaks {
        total_amplitude += peak.amplitude;
        if peak.frequency <= 0.0 {
            continue;
        }
        let ratio = peak.frequency / fundamental;
        let harmonic_error = (ratio - ratio.round()).abs();
        if harmonic_error < HARMONIC_TOLERANCE {
            harmonic_score += peak.amplitude * (1.0 - harmonic_error);
        }
    }

    if total_amplitude > 0.0 {
        harmonic_score / total_amplitude
    } else {
        0.0
    }
}

/// Mean closeness to φ over pairs whose ratio `f[j]/f[i]` (j > i) lands
/// within tolerance. 0 if no pair matches.
pub fn golden_ratio_alignment(peaks: &SpectralPeaks) -> f64 {
    let freqs = peaks.frequencies();
    let mut score = 0.0;
    let mut matches = 0usize;

    for (i, fi) in freqs.iter().enumerate() {
        if *fi == 0.0 {
            continue;
        }
        for fj in &freqs[i + 1..] {
            let error = (fj / fi - GOLDEN_RATIO).abs();
            if error < GOLDEN_TOLERANCE {
                score += 1.0 - error;
                matches += 1;
            }
        }
    }

    if matches > 0 {
        score / matches as f64
    } else {
        0.0
    }
}

pub fn harmonic_convergence(vibrational_coherence: f64, spectral_phase_stability: f64) -> bool {
    vibrational_coherence > CONVERGENCE_COHERENCE_GATE
        && spectral_phase_stability > CONVERGENCE_PHASE_GATE
}

// =============================================================================
// TESTS
// =============================================================================
