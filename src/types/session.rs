//! Session records: transition events, log entries, atemporal events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{EngineMetrics, FocusState, ReasonCode, ResonanceNode};

/// Emitted on every focus state change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub from: FocusState,
    pub to: FocusState,
    pub reason: ReasonCode,
    /// Engine clock, milliseconds
    pub at_ms: u64,
    /// Metrics as they stood when the transition fired
    pub metrics: EngineMetrics,
}

/// Geometry summary attached to a log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResonanceGeometry {
    pub nodes: Vec<ResonanceNode>,
    pub mandala_complexity: usize,
    pub golden_ratio_alignment: f64,
}

/// Standard record of a transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLogEntry {
    pub timestamp: DateTime<Utc>,
    pub at_ms: u64,
    pub state_label: FocusState,
    pub reason: ReasonCode,
    pub node_frequencies: Vec<f64>,
    pub phase: Vec<f64>,
    pub amplitude: Vec<f64>,
    pub breath_coherence: f64,
    pub vibrational_coherence: f64,
    pub spectral_phase_stability: f64,
    pub resonance_geometry: ResonanceGeometry,
}

/// Pattern descriptor of an atemporal event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolicPattern {
    pub kind: String,
    /// 1..=7
    pub recursion_level: u32,
    pub mirror_state: bool,
    /// [0, 150)
    pub parallax_depth: f64,
}

/// Engine memory captured at the moment of collapse
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrrMemory {
    pub accumulated_variance: Vec<f64>,
    pub trend_prediction: Vec<f64>,
    pub resonance_history: Vec<ResonanceNode>,
}

/// Recorded instead of a log entry when Focus 15 is entered through collapse
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtemporalEvent {
    /// Actual time shifted by up to ±5 minutes
    pub randomized_timestamp: DateTime<Utc>,
    pub actual_timestamp: DateTime<Utc>,
    pub at_ms: u64,
    pub resonance_signature: Vec<f64>,
    pub symbolic_pattern: SymbolicPattern,
    pub drr_memory: DrrMemory,
    pub no_time_markers: bool,
}

/// One entry of the in-memory session log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionRecord {
    Transition(SessionLogEntry),
    Atemporal(AtemporalEvent),
}

impl SessionRecord {
    pub fn at_ms(&self) -> u64 {
        match self {
            SessionRecord::Transition(entry) => entry.at_ms,
            SessionRecord::Atemporal(event) => event.at_ms,
        }
    }
}
