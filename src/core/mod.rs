//! Core modules for the DRR engine

pub mod api;
pub mod capture;
pub mod creative;
pub mod engine;
pub mod focus;
pub mod foresight;
pub mod metrics;
pub mod render;
pub mod resonance;
pub mod spectral;
pub mod stability;
pub mod synthesis;

pub use api::{create_router, run_server, tick_sessions, AppState, STOPPED_SESSION_TTL_MS};
pub use capture::{
    CaptureResult, CaptureSource, FrameCapture, FrameFeed, SpectrumAnalyser, Tone, ToneCapture,
    WavCapture,
};
pub use creative::CreativeFlowScheduler;
pub use engine::{DrrEngine, OperatorCommand, SessionPhase};
pub use focus::{FocusDecision, FocusInputs, FocusStateMachine};
pub use foresight::IntuitiveForesightDetector;
pub use metrics::MetricsComputer;
pub use render::{Channel, Param, SoftwareGraph, SynthesisBackend, VoiceId, WavSink, Waveform};
pub use resonance::ResonanceNodeGenerator;
pub use spectral::SpectralAnalyzer;
pub use stability::{StabilityTracker, StabilityUpdate};
pub use synthesis::{plan_audio_config, AudioSynthesisController, MemorySignal, SynthesisInputs};
