//! Core types for the DRR engine

mod audio;
mod collapse;
mod history;
mod metrics;
mod modules;
mod node;
mod output;
mod peaks;
mod reason;
mod session;
mod state;

pub use audio::{channel_pair, AudioConfig, InfrasonicPulse};
pub use collapse::TimeCollapseState;
pub use history::BoundedHistory;
pub use metrics::EngineMetrics;
pub use modules::{CreativeFlowState, IntuitiveForesightState, SpiralNode};
pub use node::ResonanceNode;
pub use output::{CaptureStatus, EngineSnapshot};
pub use peaks::{SpectralPeak, SpectralPeaks};
pub use reason::ReasonCode;
pub use session::{
    AtemporalEvent, DrrMemory, ResonanceGeometry, SessionLogEntry, SessionRecord,
    SymbolicPattern, TransitionEvent,
};
pub use state::FocusState;
