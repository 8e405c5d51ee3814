//! Engine configuration
//!
//! Every numeric knob of the engine lives here. Defaults mirror the
//! constants in `lib.rs`; a JSON file may override any subset of fields.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{DrrError, DrrResult};

/// Analyser settings for the capture side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyserConfig {
    pub fft_size: usize,
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: crate::FFT_SIZE,
            smoothing: crate::ANALYSER_SMOOTHING,
            min_decibels: crate::ANALYSER_MIN_DB,
            max_decibels: crate::ANALYSER_MAX_DB,
        }
    }
}

impl AnalyserConfig {
    /// Number of magnitude bins produced per frame
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }
}

/// Optional derived-effect modules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModuleConfig {
    pub memory_stream: bool,
    pub intuitive_foresight: bool,
    pub creative_flow: bool,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            memory_stream: true,
            intuitive_foresight: true,
            creative_flow: true,
        }
    }
}

/// How the binaural pair is placed around the carrier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BeatSplit {
    /// left = carrier, right = carrier + beat
    #[default]
    Upper,
    /// left = carrier - beat/2, right = carrier + beat/2
    Centered,
}

/// Full engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub peak_floor_db: f32,
    pub max_peaks: usize,
    pub synthetic_phase_step: f64,

    pub amplitude_history_cap: usize,
    pub variance_history_cap: usize,
    pub resonance_memory_cap: usize,

    pub variance_threshold: f64,
    pub collapse_dwell_ms: u64,
    pub focus21_coherence_gate: f64,
    pub focus21_min_stability_secs: u64,
    pub collapse_descent_ms: u64,

    pub tick_interval_ms: u64,
    pub tick_guard_ms: u64,

    pub beat_split: BeatSplit,
    pub analyser: AnalyserConfig,
    pub modules: ModuleConfig,

    /// Seed for every random draw the engine makes
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            peak_floor_db: crate::PEAK_FLOOR_DB,
            max_peaks: crate::MAX_PEAKS,
            synthetic_phase_step: crate::SYNTHETIC_PHASE_STEP,
            amplitude_history_cap: crate::AMPLITUDE_HISTORY_CAP,
            variance_history_cap: crate::VARIANCE_HISTORY_CAP,
            resonance_memory_cap: crate::RESONANCE_MEMORY_CAP,
            variance_threshold: crate::VARIANCE_STABLE_THRESHOLD,
            collapse_dwell_ms: crate::COLLAPSE_DWELL_MS,
            focus21_coherence_gate: crate::FOCUS21_COHERENCE_GATE,
            focus21_min_stability_secs: crate::FOCUS21_MIN_STABILITY_SECS,
            collapse_descent_ms: crate::COLLAPSE_DESCENT_MS,
            tick_interval_ms: crate::TICK_INTERVAL_MS,
            tick_guard_ms: crate::TICK_GUARD_MS,
            beat_split: BeatSplit::default(),
            analyser: AnalyserConfig::default(),
            modules: ModuleConfig::default(),
            seed: 0x00D2_2E5E,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file; absent fields keep their defaults
    pub fn load(path: impl AsRef<Path>) -> DrrResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> DrrResult<()> {
        if self.max_peaks == 0 {
            return Err(DrrError::Config("max_peaks must be positive".into()));
        }
        if self.amplitude_history_cap == 0
            || self.variance_history_cap == 0
            || self.resonance_memory_cap == 0
        {
            return Err(DrrError::Config("history caps must be positive".into()));
        }
        if !(self.variance_threshold > 0.0) {
            return Err(DrrError::Config("variance_threshold must be > 0".into()));
        }
        if self.collapse_descent_ms == 0 {
            return Err(DrrError::Config("collapse_descent_ms must be positive".into()));
        }
        if self.tick_interval_ms == 0 {
            return Err(DrrError::Config("tick_interval_ms must be positive".into()));
        }
        let fft = self.analyser.fft_size;
        if fft < 32 || !fft.is_power_of_two() {
            return Err(DrrError::Config(format!(
                "analyser.fft_size must be a power of two >= 32, got {}",
                fft
            )));
        }
        if !(0.0..1.0).contains(&self.analyser.smoothing) {
            return Err(DrrError::Config("analyser.smoothing must be in [0, 1)".into()));
        }
        if self.analyser.min_decibels >= self.analyser.max_decibels {
            return Err(DrrError::Config("analyser.min_decibels must be below max_decibels".into()));
        }
        Ok(())
    }
}
