//! ResonanceNodeGenerator: peaks → positioned nodes + bounded resonance memory
//!
//! The memory is the internal signal the synthesis controller follows once
//! time collapse is active, decoupled from live input.

use std::f64::consts::TAU;

use crate::types::{BoundedHistory, ResonanceNode, SpectralPeaks};
use crate::RESONANCE_MEMORY_CAP;

#[derive(Debug, Clone)]
pub struct ResonanceNodeGenerator {
    memory: BoundedHistory<ResonanceNode>,
}

impl Default for ResonanceNodeGenerator {
    fn default() -> Self {
        Self::new(RESONANCE_MEMORY_CAP)
    }
}

impl ResonanceNodeGenerator {
    pub fn new(memory_cap: usize) -> Self {
        Self {
            memory: BoundedHistory::new(memory_cap),
        }
    }

    /// Lay out this tick's nodes and append them to memory
    pub fn generate(&mut self, peaks: &SpectralPeaks, tick: u64, now_ms: u64) -> Vec<ResonanceNode> {
        let nodes = layout(peaks, tick, now_ms);
        self.memory.extend(nodes.iter().cloned());
        nodes
    }

    pub fn memory(&self) -> &BoundedHistory<ResonanceNode> {
        &self.memory
    }

    /// Append externally built nodes (replay, tests)
    pub fn remember(&mut self, nodes: impl IntoIterator<Item = ResonanceNode>) {
        self.memory.extend(nodes);
    }

    /// Strongest remembered node's frequency
    pub fn dominant_memory_frequency(&self) -> Option<f64> {
        self.memory
            .iter()
            .max_by(|a, b| a.amplitude.total_cmp(&b.amplitude))
            .map(|n| n.frequency)
    }

    /// Successive variance of remembered amplitudes
    pub fn memory_amplitude_variance(&self) -> f64 {
        let mut amplitudes = BoundedHistory::new(self.memory.len().max(1));
        amplitudes.extend(self.memory.iter().map(|n| n.amplitude));
        amplitudes.successive_variance()
    }

    pub fn reset(&mut self) {
        self.memory.clear();
    }
}

/// Polar layout: node i of n sits at angle i/n·2π, radius 100 + amp·150
pub fn layout(peaks: &SpectralPeaks, tick: u64, now_ms: u64) -> Vec<ResonanceNode> {
    let n = peaks.len();
    let fundamental = peaks
        .dominant_frequency()
        .filter(|f| *f != 0.0)
        .unwrap_or(1.0);

    peaks
        .iter()
        .enumerate()
        .map(|(i, peak)| {
            let angle = i as f64 / n as f64 * TAU;
            let radius = 100.0 + peak.amplitude * 150.0;
            ResonanceNode {
                id: format!("drr_node_{}_{}", tick, i),
                frequency: peak.frequency,
                amplitude: peak.amplitude,
                phase: peak.phase,
                stability_score: peak.amplitude,
                x: angle.cos() * radius,
                y: angle.sin() * radius,
                timestamp: now_ms,
                harmonic_index: (peak.frequency / fundamental).round() as i64,
                resonance_depth: peak.amplitude * peak.phase,
            }
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
