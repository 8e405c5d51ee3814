//! AudioSynthesisController: metrics → AudioConfig → backend parameter targets
//!
//! Baseline: carrier follows the dominant peak, beat narrows with coherence.
//! Time collapse: carrier and modulation follow resonance memory, the beat
//! descends 4 → 0.5 Hz over the descent span, and two infrasonic pulses fade in.

use crate::config::{BeatSplit, EngineConfig};
use crate::core::render::{Channel, Param, SynthesisBackend, VoiceId, Waveform};
use crate::types::{AudioConfig, EngineMetrics, InfrasonicPulse, TimeCollapseState};
use crate::{
    BASELINE_BEAT_HZ, BASELINE_CARRIER_HZ, BEAT_COHERENCE_SPAN_HZ, COLLAPSE_BEAT_RAMP_S,
    COLLAPSE_BEAT_SPAN_HZ, COLLAPSE_BEAT_START_HZ, COLLAPSE_DESCENT_MS, DISSONANCE_DETUNE,
    DISSONANCE_GAIN, FREQUENCY_RAMP_S, GAIN_RAMP_S, INFRASONIC_FADE_S, INFRASONIC_LAYER_LEVEL,
    INFRASONIC_PULSE_HZ, INFRASONIC_PULSE_SCALE, VOICE_GAIN,
};

/// Resonance-memory signal used once time collapse is active
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MemorySignal {
    /// Frequency of the strongest remembered node
    pub dominant_frequency: Option<f64>,
    /// Successive variance of remembered amplitudes
    pub amplitude_variance: f64,
}

/// Everything the controller reads on one tick
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInputs {
    pub metrics: EngineMetrics,
    pub dominant_frequency: Option<f64>,
    pub collapse: TimeCollapseState,
    pub memory: MemorySignal,
}

/// Map one tick's inputs to the target audio configuration
pub fn plan_audio_config(inputs: &SynthesisInputs, split: BeatSplit, descent_ms: u64) -> AudioConfig {
    let metrics = &inputs.metrics;

    if inputs.collapse.active {
        let progress = (inputs.collapse.stability_duration_secs as f64 * 1000.0
            / descent_ms.max(1) as f64)
            .min(1.0);
        let beat = COLLAPSE_BEAT_START_HZ - progress * COLLAPSE_BEAT_SPAN_HZ;
        let carrier = inputs.memory.dominant_frequency.unwrap_or(BASELINE_CARRIER_HZ);

        let mut config = AudioConfig::from_carrier_and_beat(carrier, beat, split);
        config.infrasonic_layer = INFRASONIC_LAYER_LEVEL;
        config.modulation_rhythm = (inputs.memory.amplitude_variance * 10.0).min(1.0);
        config.infrasonic_pulses = Some(
            INFRASONIC_PULSE_HZ
                .iter()
                .map(|&frequency| InfrasonicPulse {
                    frequency,
                    amplitude: INFRASONIC_LAYER_LEVEL * INFRASONIC_PULSE_SCALE,
                })
                .collect(),
        );
        config.collapse_progress = Some(progress);
        return config;
    }

    let carrier = inputs.dominant_frequency.unwrap_or(BASELINE_CARRIER_HZ);
    let beat = BASELINE_BEAT_HZ - metrics.vibrational_coherence * BEAT_COHERENCE_SPAN_HZ;
    let mut config = AudioConfig::from_carrier_and_beat(carrier, beat, split);
    config.infrasonic_layer = if metrics.harmonic_convergence {
        INFRASONIC_LAYER_LEVEL
    } else {
        0.0
    };
    config.modulation_rhythm = metrics.breath_rhythm;
    config
}

#[derive(Debug, Clone, Copy)]
struct BinauralVoices {
    left: VoiceId,
    right: VoiceId,
    dissonance: VoiceId,
}

/// Owns the synthesis backend and its voices for one session
#[derive(Debug)]
pub struct AudioSynthesisController<B: SynthesisBackend> {
    backend: B,
    split: BeatSplit,
    descent_ms: u64,
    voices: Option<BinauralVoices>,
    infrasonic: Vec<VoiceId>,
    /// Fading voices and the backend time their fade ends
    retired: Vec<(VoiceId, f64)>,
    current: AudioConfig,
}

impl<B: SynthesisBackend> AudioSynthesisController<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            split: BeatSplit::default(),
            descent_ms: COLLAPSE_DESCENT_MS,
            voices: None,
            infrasonic: Vec::new(),
            retired: Vec::new(),
            current: AudioConfig::baseline(),
        }
    }

    pub fn with_config(backend: B, config: &EngineConfig) -> Self {
        Self {
            split: config.beat_split,
            descent_ms: config.collapse_descent_ms,
            ..Self::new(backend)
        }
    }

    /// Create the binaural pair and dissonance voice at baseline
    pub fn start(&mut self) {
        if self.voices.is_some() {
            return;
        }
        let b = &mut self.backend;
        let voices = BinauralVoices {
            left: b.create_voice(Waveform::Sine, Channel::Left),
            right: b.create_voice(Waveform::Sine, Channel::Right),
            dissonance: b.create_voice(Waveform::Sawtooth, Channel::Both),
        };

        self.current = AudioConfig::from_carrier_and_beat(BASELINE_CARRIER_HZ, BASELINE_BEAT_HZ, self.split);
        b.set_target(voices.left, Param::Frequency, self.current.left_channel_hz, 0.0);
        b.set_target(voices.right, Param::Frequency, self.current.right_channel_hz, 0.0);
        b.set_target(voices.dissonance, Param::Frequency, self.current.carrier_freq, 0.0);
        b.set_target(voices.left, Param::Gain, VOICE_GAIN, GAIN_RAMP_S);
        b.set_target(voices.right, Param::Gain, VOICE_GAIN, GAIN_RAMP_S);
        self.voices = Some(voices);
    }

    /// Plan this tick's config and steer the voices toward it
    pub fn update(&mut self, inputs: &SynthesisInputs, dissonance_level: f64) -> &AudioConfig {
        let config = plan_audio_config(inputs, self.split, self.descent_ms);
        self.apply(config, dissonance_level);
        &self.current
    }

    fn apply(&mut self, config: AudioConfig, dissonance_level: f64) {
        if let Some(voices) = self.voices {
            // the collapse descent glides more slowly than live tracking
            let tc = if config.collapse_progress.is_some() {
                COLLAPSE_BEAT_RAMP_S
            } else {
                FREQUENCY_RAMP_S
            };
            let b = &mut self.backend;
            b.set_target(voices.left, Param::Frequency, config.left_channel_hz, tc);
            b.set_target(voices.right, Param::Frequency, config.right_channel_hz, tc);

            let d = dissonance_level.clamp(0.0, 1.0);
            b.set_target(
                voices.dissonance,
                Param::Frequency,
                config.carrier_freq * (1.0 + d * DISSONANCE_DETUNE),
                FREQUENCY_RAMP_S,
            );
            b.set_target(voices.dissonance, Param::Gain, d * DISSONANCE_GAIN, GAIN_RAMP_S);

            self.reap_retired();
            self.sync_infrasonic(config.infrasonic_pulses.as_deref());
        }
        self.current = config;
    }

    fn sync_infrasonic(&mut self, pulses: Option<&[InfrasonicPulse]>) {
        match pulses {
            Some(pulses) if self.infrasonic.is_empty() => {
                for pulse in pulses {
                    let v = self.backend.create_voice(Waveform::Sine, Channel::Both);
                    self.backend.set_target(v, Param::Frequency, pulse.frequency, 0.0);
                    self.backend.linear_ramp(v, Param::Gain, pulse.amplitude, INFRASONIC_FADE_S);
                    self.infrasonic.push(v);
                }
            }
            None if !self.infrasonic.is_empty() => {
                let silent_at = self.backend.current_time() + INFRASONIC_FADE_S;
                for v in self.infrasonic.drain(..) {
                    self.backend.linear_ramp(v, Param::Gain, 0.0, INFRASONIC_FADE_S);
                    self.retired.push((v, silent_at));
                }
            }
            _ => {}
        }
    }

    /// Stop voices whose fade-out has finished
    fn reap_retired(&mut self) {
        let now = self.backend.current_time();
        let backend = &mut self.backend;
        self.retired.retain(|&(v, silent_at)| {
            if now >= silent_at {
                backend.stop(v);
                false
            } else {
                true
            }
        });
    }

    /// Stop every voice. Safe to call any number of times.
    pub fn stop(&mut self) {
        if let Some(voices) = self.voices.take() {
            for v in [voices.left, voices.right, voices.dissonance] {
                self.backend.stop(v);
            }
        }
        let retired = self.retired.drain(..).map(|(v, _)| v);
        for v in self.infrasonic.drain(..).chain(retired) {
            self.backend.stop(v);
        }
        self.current = AudioConfig::from_carrier_and_beat(BASELINE_CARRIER_HZ, BASELINE_BEAT_HZ, self.split);
    }

    pub fn is_running(&self) -> bool {
        self.voices.is_some()
    }

    pub fn current(&self) -> &AudioConfig {
        &self.current
    }

    pub fn infrasonic_voices(&self) -> &[VoiceId] {
        &self.infrasonic
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

// =============================================================================
// TESTS
// =============================================================================
