//! State of the auxiliary derived-effect modules

use serde::{Deserialize, Serialize};

/// Creative flow: probabilistic dissonance injection
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CreativeFlowState {
    pub enabled: bool,
    /// [0, 1], decays linearly toward 0 absent re-injection
    pub dissonance_level: f64,
    /// True only on the tick an injection happened
    pub rhythmic_injection: bool,
    /// Engine clock ms before which no injection may happen
    pub next_injection_eligible_at: u64,
}

/// One point of the golden-angle spiral
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpiralNode {
    pub x: f64,
    pub y: f64,
    pub intensity: f64,
}

/// Intuitive foresight: golden-angle spiral convergence
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IntuitiveForesightState {
    pub enabled: bool,
    /// [0, 1]
    pub spiral_intensity: f64,
    pub convergence_detected: bool,
    /// Rebuilt in full on each convergence tick
    pub spiral_nodes: Vec<SpiralNode>,
}
