//! DRR: Dynamic Resonance Response engine
//!
//! capture → SpectralAnalyzer → MetricsComputer → {ResonanceNodeGenerator, StabilityTracker}
//! → FocusStateMachine → AudioSynthesisController → output device

pub mod clock;
pub mod config;
pub mod core;
pub mod error;
pub mod telemetry;
pub mod types;

pub use error::{CaptureError, DrrError, DrrResult};

// =============================================================================
// SPECTRAL ANALYSIS [C]
// =============================================================================

/// Bins at or below this level (dB) are never peaks
pub const PEAK_FLOOR_DB: f32 = -60.0;

/// Maximum number of peaks kept per tick
pub const MAX_PEAKS: usize = 12;

/// Step of the synthetic phase function, radians per bin
pub const SYNTHETIC_PHASE_STEP: f64 = 0.1;

/// Analyser transform size (bin count is half of this)
pub const FFT_SIZE: usize = 8192;

/// Analyser smoothing constant between successive frames
pub const ANALYSER_SMOOTHING: f32 = 0.1;

/// Analyser range (dB)
pub const ANALYSER_MIN_DB: f32 = -90.0;
pub const ANALYSER_MAX_DB: f32 = -10.0;

/// Fallback capture sample rate
pub const DEFAULT_SAMPLE_RATE: f32 = 44100.0;

// =============================================================================
// METRICS [C]
// =============================================================================

/// φ
pub const GOLDEN_RATIO: f64 = 1.618_033_988_7;

/// Golden angle (137.5°) in radians
pub const GOLDEN_ANGLE: f64 = 2.39996;

/// A ratio within this distance of an integer counts as a harmonic
pub const HARMONIC_TOLERANCE: f64 = 0.05;

/// A pair ratio within this distance of φ counts as golden
pub const GOLDEN_TOLERANCE: f64 = 0.1;

/// Harmonic convergence gates
pub const CONVERGENCE_COHERENCE_GATE: f64 = 0.8;
pub const CONVERGENCE_PHASE_GATE: f64 = 0.7;

// =============================================================================
// HISTORY CAPS [C]
// =============================================================================

pub const AMPLITUDE_HISTORY_CAP: usize = 20;
pub const VARIANCE_HISTORY_CAP: usize = 200;
pub const RESONANCE_MEMORY_CAP: usize = 100;

// =============================================================================
// STABILITY / TIME COLLAPSE [C]
// =============================================================================

/// Variance below this counts as stable
pub const VARIANCE_STABLE_THRESHOLD: f64 = 0.01;

/// Continuous stable dwell before the time-collapse event (milliseconds)
pub const COLLAPSE_DWELL_MS: u64 = 45_000;

/// Focus 21 gates
pub const FOCUS21_COHERENCE_GATE: f64 = 0.9;
pub const FOCUS21_MIN_STABILITY_SECS: u64 = 120;

/// Beat descent span during time collapse (milliseconds)
pub const COLLAPSE_DESCENT_MS: u64 = 180_000;

// =============================================================================
// CONTROL LOOP [C]
// =============================================================================

/// Nominal poll cadence (milliseconds)
pub const TICK_INTERVAL_MS: u64 = 100;

/// Ticks closer than this to the last committed tick are dropped (milliseconds)
pub const TICK_GUARD_MS: u64 = 250;

// =============================================================================
// SYNTHESIS [C]
// =============================================================================

pub const BASELINE_CARRIER_HZ: f64 = 440.0;
pub const BASELINE_BEAT_HZ: f64 = 10.0;
pub const BEAT_COHERENCE_SPAN_HZ: f64 = 8.0;
pub const COLLAPSE_BEAT_START_HZ: f64 = 4.0;
pub const COLLAPSE_BEAT_SPAN_HZ: f64 = 3.5;
pub const INFRASONIC_LAYER_LEVEL: f64 = 0.9;
pub const INFRASONIC_PULSE_HZ: [f64; 2] = [0.9, GOLDEN_RATIO];

/// Pulse amplitude relative to the infrasonic layer level
pub const INFRASONIC_PULSE_SCALE: f64 = 0.5;

/// Output level of each binaural voice
pub const VOICE_GAIN: f64 = 0.1;

/// Dissonance voice: detune and gain per unit of dissonance level
pub const DISSONANCE_DETUNE: f64 = 0.06;
pub const DISSONANCE_GAIN: f64 = 0.1;

/// Ramp time constants (seconds)
pub const FREQUENCY_RAMP_S: f64 = 0.1;
pub const GAIN_RAMP_S: f64 = 0.05;
pub const COLLAPSE_BEAT_RAMP_S: f64 = 0.5;
pub const INFRASONIC_FADE_S: f64 = 0.5;

// =============================================================================
// AUXILIARY MODULES [C]
// =============================================================================

pub const CREATIVE_FLOW_COHERENCE_GATE: f64 = 0.7;
pub const CREATIVE_FLOW_INJECTION_PROBABILITY: f64 = 0.3;
pub const CREATIVE_FLOW_DECAY_PER_TICK: f64 = 0.01;
pub const FORESIGHT_ALIGNMENT_GATE: f64 = 0.6;
pub const FORESIGHT_DECAY_PER_TICK: f64 = 0.02;
pub const FORESIGHT_SPIRAL_STEP: f64 = 15.0;

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "0.1.0";
