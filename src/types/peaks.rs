//! Spectral peak structures

use serde::{Deserialize, Serialize};

/// One dominant spectral peak
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralPeak {
    /// Hz, > 0
    pub frequency: f64,
    /// Linear amplitude, >= 0
    pub amplitude: f64,
    /// Radians. Synthetic: a function of bin index, not measured phase
    pub phase: f64,
}

impl SpectralPeak {
    pub fn new(frequency: f64, amplitude: f64, phase: f64) -> Self {
        Self { frequency, amplitude, phase }
    }
}

/// Peaks of one tick, sorted by amplitude descending
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectralPeaks {
    peaks: Vec<SpectralPeak>,
}

impl SpectralPeaks {
    /// No peaks (silence)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sort by amplitude descending and keep the strongest `cap`
    pub fn from_candidates(mut candidates: Vec<SpectralPeak>, cap: usize) -> Self {
        // stable sort keeps detection order among equal amplitudes
        candidates.sort_by(|a, b| b.amplitude.total_cmp(&a.amplitude));
        candidates.truncate(cap);
        Self { peaks: candidates }
    }

    /// Use peaks in the given order without sorting.
    ///
    /// For callers that already hold an ordered set (tests, replay).
    pub fn from_ordered(peaks: Vec<SpectralPeak>) -> Self {
        Self { peaks }
    }

    pub fn as_slice(&self) -> &[SpectralPeak] {
        &self.peaks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SpectralPeak> {
        self.peaks.iter()
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn frequencies(&self) -> Vec<f64> {
        self.peaks.iter().map(|p| p.frequency).collect()
    }

    pub fn amplitudes(&self) -> Vec<f64> {
        self.peaks.iter().map(|p| p.amplitude).collect()
    }

    /// Strongest peak frequency, if any
    pub fn dominant_frequency(&self) -> Option<f64> {
        self.peaks.first().map(|p| p.frequency)
    }

    /// Mean amplitude; `None` when empty
    pub fn mean_amplitude(&self) -> Option<f64> {
        if self.peaks.is_empty() {
            return None;
        }
        Some(self.peaks.iter().map(|p| p.amplitude).sum::<f64>() / self.peaks.len() as f64)
    }
}

impl<'a> IntoIterator for &'a SpectralPeaks {
    type Item = &'a SpectralPeak;
    type IntoIter = std::slice::Iter<'a, SpectralPeak>;

    fn into_iter(self) -> Self::IntoIter {
        self.peaks.iter()
    }
}
