//! Time-collapse sub-state

use serde::{Deserialize, Serialize};

/// Exposed state of the stability tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeCollapseState {
    /// One-shot: stays true for the rest of the session once triggered
    pub active: bool,
    /// Start of the current sub-threshold run, engine clock ms
    pub stable_since_ms: Option<u64>,
    /// floor((now - stable_since) / 1000), 0 without a run
    pub stability_duration_secs: u64,
}
