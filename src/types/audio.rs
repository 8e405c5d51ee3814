//! Synthesis parameter structures

use serde::{Deserialize, Serialize};

use crate::config::BeatSplit;

/// One infrasonic pulse voice
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InfrasonicPulse {
    pub frequency: f64,
    pub amplitude: f64,
}

/// Parameters the synthesis graph is steered toward
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    pub carrier_freq: f64,
    pub binaural_beat_hz: f64,
    pub left_channel_hz: f64,
    pub right_channel_hz: f64,
    /// [0, 1]
    pub infrasonic_layer: f64,
    /// [0, 1], breath rhythm or resonance-memory rhythm during collapse
    pub modulation_rhythm: f64,
    /// Only present while time collapse is active
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infrasonic_pulses: Option<Vec<InfrasonicPulse>>,
    /// Beat descent progress, only present while time collapse is active
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collapse_progress: Option<f64>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self::baseline()
    }
}

impl AudioConfig {
    /// 440 Hz carrier with a 10 Hz beat
    pub fn baseline() -> Self {
        Self::from_carrier_and_beat(
            crate::BASELINE_CARRIER_HZ,
            crate::BASELINE_BEAT_HZ,
            BeatSplit::Upper,
        )
    }

    /// Build with the channel pair derived from carrier and beat
    pub fn from_carrier_and_beat(carrier: f64, beat: f64, split: BeatSplit) -> Self {
        let (left, right) = channel_pair(carrier, beat, split);
        Self {
            carrier_freq: carrier,
            binaural_beat_hz: beat,
            left_channel_hz: left,
            right_channel_hz: right,
            infrasonic_layer: 0.0,
            modulation_rhythm: 0.0,
            infrasonic_pulses: None,
            collapse_progress: None,
        }
    }

    /// Perceived beat, |right - left|
    pub fn perceived_beat(&self) -> f64 {
        (self.right_channel_hz - self.left_channel_hz).abs()
    }
}

/// (left, right) for a carrier and beat
pub fn channel_pair(carrier: f64, beat: f64, split: BeatSplit) -> (f64, f64) {
    match split {
        BeatSplit::Upper => (carrier, carrier + beat),
        BeatSplit::Centered => (carrier - beat / 2.0, carrier + beat / 2.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline() {
        let config = AudioConfig::baseline();
        assert_eq!(config.carrier_freq, 440.0);
        assert_eq!(config.binaural_beat_hz, 10.0);
        assert_eq!(config.left_channel_hz, 440.0);
        assert_eq!(config.right_channel_hz, 450.0);
        assert!(config.infrasonic_pulses.is_none());
    }

    #[test]
    fn test_split_policies_keep_beat() {
        for split in [BeatSplit::Upper, BeatSplit::Centered] {
            let config = AudioConfig::from_carrier_and_beat(200.0, 6.0, split);
            assert!((config.perceived_beat() - 6.0).abs() < 1e-12);
        }
        let centered = AudioConfig::from_carrier_and_beat(200.0, 6.0, BeatSplit::Centered);
        assert_eq!(centered.left_channel_hz, 197.0);
    }
}
