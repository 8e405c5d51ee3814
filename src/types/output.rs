//! Immutable per-tick snapshot handed to renderers and loggers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    AudioConfig, CreativeFlowState, EngineMetrics, FocusState, IntuitiveForesightState,
    ReasonCode, ResonanceNode, TimeCollapseState,
};

/// Whether live input is feeding the analyser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaptureStatus {
    /// Session not started
    Idle,
    Active,
    /// Acquisition failed or operator toggled capture off
    Disabled,
}

/// Output emitted once per committed tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Wall clock, for external logs
    pub timestamp: DateTime<Utc>,
    /// Committed tick counter
    pub tick: u64,
    /// Engine clock, milliseconds
    pub at_ms: u64,
    pub capture: CaptureStatus,
    pub metrics: EngineMetrics,
    /// Advances 0.1 rad per committed tick, wraps at 2π
    pub current_phase: f64,
    pub dominant_frequencies: Vec<f64>,
    pub focus_state: FocusState,
    pub reason: ReasonCode,
    pub time_collapse: TimeCollapseState,
    pub resonance_nodes: Vec<ResonanceNode>,
    pub resonance_memory_len: usize,
    pub audio_config: AudioConfig,
    pub creative_flow: CreativeFlowState,
    pub foresight: IntuitiveForesightState,
}

impl EngineSnapshot {
    /// Snapshot of an engine that has not ticked yet
    pub fn initial(capture: CaptureStatus) -> Self {
        Self {
            timestamp: Utc::now(),
            tick: 0,
            at_ms: 0,
            capture,
            metrics: EngineMetrics::zero(),
            current_phase: 0.0,
            dominant_frequencies: Vec::new(),
            focus_state: FocusState::Focus12,
            reason: ReasonCode::R002_STATE_FOCUS_12,
            time_collapse: TimeCollapseState::default(),
            resonance_nodes: Vec::new(),
            resonance_memory_len: 0,
            audio_config: AudioConfig::baseline(),
            creative_flow: CreativeFlowState::default(),
            foresight: IntuitiveForesightState::default(),
        }
    }

    /// Format for terminal display (with colors)
    pub fn to_terminal_string(&self) -> String {
        let color = self.focus_state.color_code();
        let reset = FocusState::color_reset();
        format!(
            "{}{} {} | coh={:.3} phase={:.3} φ={:.3} var={:.4} | beat={:.2}Hz @ {:.1}Hz | stable={}s{} | {}{}",
            color,
            self.focus_state.emoji(),
            self.focus_state,
            self.metrics.vibrational_coherence,
            self.metrics.spectral_phase_stability,
            self.metrics.golden_ratio_alignment,
            self.metrics.amplitude_variance,
            self.audio_config.binaural_beat_hz,
            self.audio_config.carrier_freq,
            self.time_collapse.stability_duration_secs,
            if self.time_collapse.active { " ⧗" } else { "" },
            self.reason.code(),
            reset
        )
    }

    /// Format for parseable output (no colors)
    pub fn to_parseable_string(&self) -> String {
        format!(
            "tick={} | state={} | coherence={:.3} | phase_stability={:.3} | golden={:.3} | variance={:.4} | beat={:.2} | carrier={:.1} | collapse={} | stable={}s | reason={}",
            self.tick,
            self.focus_state,
            self.metrics.vibrational_coherence,
            self.metrics.spectral_phase_stability,
            self.metrics.golden_ratio_alignment,
            self.metrics.amplitude_variance,
            self.audio_config.binaural_beat_hz,
            self.audio_config.carrier_freq,
            self.time_collapse.active,
            self.time_collapse.stability_duration_secs,
            self.reason.code()
        )
    }
}
