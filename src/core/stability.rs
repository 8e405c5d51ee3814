//! StabilityTracker: variance dwell timer and one-shot time collapse
//!
//! Strict dwell hysteresis. Variance must stay below threshold for the
//! full dwell; one tick at or above threshold clears the run.

use crate::config::EngineConfig;
use crate::types::{BoundedHistory, TimeCollapseState};
use crate::{COLLAPSE_DWELL_MS, VARIANCE_HISTORY_CAP, VARIANCE_STABLE_THRESHOLD};

/// Result of feeding one tick to the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityUpdate {
    pub state: TimeCollapseState,
    /// True only on the tick collapse became active
    pub collapse_triggered: bool,
    /// True when this tick cleared an existing run
    pub run_reset: bool,
}

#[derive(Debug, Clone)]
pub struct StabilityTracker {
    variance_history: BoundedHistory<f64>,
    stable_since_ms: Option<u64>,
    active: bool,
    duration_secs: u64,
    threshold: f64,
    dwell_ms: u64,
}

impl Default for StabilityTracker {
    fn default() -> Self {
        Self::new(VARIANCE_STABLE_THRESHOLD, COLLAPSE_DWELL_MS, VARIANCE_HISTORY_CAP)
    }
}

impl StabilityTracker {
    pub fn new(threshold: f64, dwell_ms: u64, history_cap: usize) -> Self {
        Self {
            variance_history: BoundedHistory::new(history_cap),
            stable_since_ms: None,
            active: false,
            duration_secs: 0,
            threshold,
            dwell_ms,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.variance_threshold,
            config.collapse_dwell_ms,
            config.variance_history_cap,
        )
    }

    /// Feed one tick's amplitude variance
    pub fn observe(&mut self, variance: f64, now_ms: u64) -> StabilityUpdate {
        self.variance_history.push(variance);

        if variance < self.threshold {
            let since = *self.stable_since_ms.get_or_insert(now_ms);
            let stable_ms = now_ms.saturating_sub(since);
            self.duration_secs = stable_ms / 1000;

            let triggered = !self.active && stable_ms >= self.dwell_ms;
            if triggered {
                self.active = true;
            }
            StabilityUpdate {
                state: self.state(),
                collapse_triggered: triggered,
                run_reset: false,
            }
        } else {
            self.clear_run()
        }
    }

    /// A tick with no spectral input. Records zero variance but breaks the
    /// run: silence is not stability.
    pub fn observe_silence(&mut self) -> StabilityUpdate {
        self.variance_history.push(0.0);
        self.clear_run()
    }

    fn clear_run(&mut self) -> StabilityUpdate {
        let run_reset = self.stable_since_ms.take().is_some();
        self.duration_secs = 0;
        StabilityUpdate {
            state: self.state(),
            collapse_triggered: false,
            run_reset,
        }
    }

    pub fn state(&self) -> TimeCollapseState {
        TimeCollapseState {
            active: self.active,
            stable_since_ms: self.stable_since_ms,
            stability_duration_secs: self.duration_secs,
        }
    }

    pub fn variance_history(&self) -> &BoundedHistory<f64> {
        &self.variance_history
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Back to a fresh session
    pub fn reset(&mut self) {
        self.variance_history.clear();
        self.stable_since_ms = None;
        self.active = false;
        self.duration_secs = 0;
    }
}

// =============================================================================
// TESTS
// =============================================================================
