//! Error hierarchy for the DRR engine
//!
//! Nothing here is fatal to the process: a `CaptureError` degrades the
//! session to disabled capture, everything else surfaces as a `DrrError`.

use thiserror::Error;

/// Why a capture stream could not be acquired.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The user (or platform) refused microphone access.
    #[error("capture permission denied")]
    PermissionDenied,

    /// No capture device is attached.
    #[error("capture device not found: {0}")]
    DeviceNotFound(String),

    /// Device exists but is held by another application.
    #[error("capture device busy")]
    DeviceBusy,

    /// Input exists but cannot be decoded (format, channel layout).
    #[error("unsupported capture input: {0}")]
    Unsupported(String),
}

/// Root error type for the engine, CLI and API.
#[derive(Error, Debug)]
pub enum DrrError {
    #[error("config error: {0}")]
    Config(String),

    #[error("session error: {0}")]
    Session(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type DrrResult<T> = Result<T, DrrError>;
