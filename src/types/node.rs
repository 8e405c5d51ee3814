//! Resonance nodes

use serde::{Deserialize, Serialize};

/// A positioned record derived from one spectral peak
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResonanceNode {
    /// `drr_node_{tick}_{index}`, unique within a session
    pub id: String,
    pub frequency: f64,
    pub amplitude: f64,
    pub phase: f64,
    pub stability_score: f64,
    pub x: f64,
    pub y: f64,
    /// Engine clock, milliseconds
    pub timestamp: u64,
    /// round(freq / strongest freq)
    pub harmonic_index: i64,
    /// amplitude * phase
    pub resonance_depth: f64,
}
