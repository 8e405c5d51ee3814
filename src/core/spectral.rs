//! SpectralAnalyzer: dB magnitude buffer → dominant peaks
//!
//! A bin is a peak when it is above the floor and strictly above its two
//! neighbours on each side. Phase is synthetic (see `synthetic_phase`):
//! the capture stream only exposes magnitudes.

use crate::config::EngineConfig;
use crate::types::{SpectralPeak, SpectralPeaks};

/// Peak extractor for one magnitude frame
#[derive(Debug, Clone)]
pub struct SpectralAnalyzer {
    floor_db: f32,
    max_peaks: usize,
    phase_step: f64,
}

impl Default for SpectralAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectralAnalyzer {
    /// Create analyzer with default floor (-60 dB) and cap (12)
    pub fn new() -> Self {
        Self {
            floor_db: crate::PEAK_FLOOR_DB,
            max_peaks: crate::MAX_PEAKS,
            phase_step: crate::SYNTHETIC_PHASE_STEP,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            floor_db: config.peak_floor_db,
            max_peaks: config.max_peaks,
            phase_step: config.synthetic_phase_step,
        }
    }

    /// Extract up to `max_peaks` peaks, strongest first.
    ///
    /// `magnitudes_db` holds N bins covering 0..sample_rate/2.
    pub fn extract(&self, magnitudes_db: &[f32], sample_rate: f32) -> SpectralPeaks {
        let n = magnitudes_db.len();
        if n < 5 || !(sample_rate > 0.0) {
            return SpectralPeaks::empty();
        }

        let nyquist = sample_rate as f64 / 2.0;
        let mut candidates = Vec::new();

        for i in 2..n - 2 {
            let current = magnitudes_db[i];
            if current > self.floor_db
                && current > magnitudes_db[i - 1]
                && current > magnitudes_db[i + 1]
                && current > magnitudes_db[i - 2]
                && current > magnitudes_db[i + 2]
            {
                let frequency = (i as f64 / n as f64) * nyquist;
                let amplitude = 10f64.powf(current as f64 / 20.0);
                candidates.push(SpectralPeak::new(frequency, amplitude, self.synthetic_phase(i)));
            }
        }

        SpectralPeaks::from_candidates(candidates, self.max_peaks)
    }

    /// Placeholder phase: atan2(sin(i·k), cos(i·k)), i.e. i·k wrapped to (-π, π].
    ///
    /// Deterministic in the bin index only; not a measured phase.
    pub fn synthetic_phase(&self, index: usize) -> f64 {
        let x = index as f64 * self.phase_step;
        x.sin().atan2(x.cos())
    }
}

// =============================================================================
// TESTS
// =============================================================================
