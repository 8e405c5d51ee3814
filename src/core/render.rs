//! Synthesis backend: steerable voices with scheduled parameter ramps
//!
//! The control loop only writes targets. Ramps are applied per sample
//! inside `SoftwareGraph::render`, so a stalled loop never produces a
//! discontinuity.

use std::f64::consts::TAU;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::DrrResult;

/// Handle to a voice inside a backend
pub type VoiceId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Sawtooth,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Left,
    Right,
    Both,
}

/// Automatable voice parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    Frequency,
    Gain,
}

/// Output contract the synthesis controller drives.
///
/// Writes are fire-and-forget: unknown or stopped voices are ignored.
pub trait SynthesisBackend: Send + Sync + std::fmt::Debug {
    /// Create a silent voice (gain 0)
    fn create_voice(&mut self, waveform: Waveform, channel: Channel) -> VoiceId;

    /// Exponential approach toward `value` with time constant `time_constant_s`
    fn set_target(&mut self, voice: VoiceId, param: Param, value: f64, time_constant_s: f64);

    /// Linear ramp reaching `value` after `duration_s`
    fn linear_ramp(&mut self, voice: VoiceId, param: Param, value: f64, duration_s: f64);

    /// Stop a voice. Stopping twice is a no-op.
    fn stop(&mut self, voice: VoiceId);

    fn is_stopped(&self, voice: VoiceId) -> bool;

    /// Seconds of audio rendered so far
    fn current_time(&self) -> f64;
}

// =============================================================================
// PARAMETER AUTOMATION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Ramp {
    Hold,
    /// Per-sample coefficient 1 - e^(-1 / (τ·sr))
    Exponential { target: f64, coeff: f64 },
    Linear { from: f64, to: f64, total: u64, elapsed: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Automation {
    value: f64,
    ramp: Ramp,
}

impl Automation {
    fn new(value: f64) -> Self {
        Self { value, ramp: Ramp::Hold }
    }

    fn target(&self) -> f64 {
        match self.ramp {
            Ramp::Hold => self.value,
            Ramp::Exponential { target, .. } => target,
            Ramp::Linear { to, .. } => to,
        }
    }

    fn set_target(&mut self, target: f64, time_constant_s: f64, sample_rate: f64) {
        let samples = time_constant_s * sample_rate;
        self.ramp = if samples <= 0.0 {
            self.value = target;
            Ramp::Hold
        } else {
            Ramp::Exponential {
                target,
                coeff: 1.0 - (-1.0 / samples).exp(),
            }
        };
    }

    fn linear(&mut self, to: f64, duration_s: f64, sample_rate: f64) {
        let total = (duration_s * sample_rate).round().max(0.0) as u64;
        self.ramp = if total == 0 {
            self.value = to;
            Ramp::Hold
        } else {
            Ramp::Linear { from: self.value, to, total, elapsed: 0 }
        };
    }

    fn step(&mut self) -> f64 {
        match &mut self.ramp {
            Ramp::Hold => {}
            Ramp::Exponential { target, coeff } => {
                self.value += (*target - self.value) * *coeff;
            }
            Ramp::Linear { from, to, total, elapsed } => {
                *elapsed += 1;
                if *elapsed >= *total {
                    self.value = *to;
                    self.ramp = Ramp::Hold;
                } else {
                    self.value = *from + (*to - *from) * (*elapsed as f64 / *total as f64);
                }
            }
        }
        self.value
    }
}

// =============================================================================
// SOFTWARE GRAPH
// =============================================================================

#[derive(Debug, Clone)]
struct Voice {
    waveform: Waveform,
    channel: Channel,
    phase: f64,
    frequency: Automation,
    gain: Automation,
    stopped: bool,
}

impl Voice {
    fn sample(&self) -> f64 {
        let cycle = self.phase / TAU;
        match self.waveform {
            Waveform::Sine => self.phase.sin(),
            Waveform::Sawtooth => 2.0 * cycle - 1.0,
            Waveform::Square => {
                if cycle < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }
}

/// In-process stereo renderer
#[derive(Debug, Clone)]
pub struct SoftwareGraph {
    sample_rate: f64,
    voices: Vec<Voice>,
    frames_rendered: u64,
}

impl SoftwareGraph {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            voices: Vec::new(),
            frames_rendered: 0,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Fill `frames` with the next block of stereo audio
    pub fn render(&mut self, frames: &mut [[f32; 2]]) {
        let sr = self.sample_rate;
        for frame in frames.iter_mut() {
            let (mut left, mut right) = (0.0f64, 0.0f64);
            for voice in self.voices.iter_mut().filter(|v| !v.stopped) {
                let freq = voice.frequency.step();
                let gain = voice.gain.step();
                let s = voice.sample() * gain;
                match voice.channel {
                    Channel::Left => left += s,
                    Channel::Right => right += s,
                    Channel::Both => {
                        left += s;
                        right += s;
                    }
                }
                voice.phase = (voice.phase + TAU * freq / sr).rem_euclid(TAU);
            }
            *frame = [left.clamp(-1.0, 1.0) as f32, right.clamp(-1.0, 1.0) as f32];
        }
        self.frames_rendered += frames.len() as u64;
    }

    /// Current (smoothed) parameter value
    pub fn value(&self, voice: VoiceId, param: Param) -> Option<f64> {
        self.voices.get(voice).map(|v| match param {
            Param::Frequency => v.frequency.value,
            Param::Gain => v.gain.value,
        })
    }

    /// Value the parameter is ramping toward
    pub fn target(&self, voice: VoiceId, param: Param) -> Option<f64> {
        self.voices.get(voice).map(|v| match param {
            Param::Frequency => v.frequency.target(),
            Param::Gain => v.gain.target(),
        })
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn live_voices(&self) -> usize {
        self.voices.iter().filter(|v| !v.stopped).count()
    }

    fn automation(&mut self, voice: VoiceId, param: Param) -> Option<&mut Automation> {
        self.voices
            .get_mut(voice)
            .filter(|v| !v.stopped)
            .map(|v| match param {
                Param::Frequency => &mut v.frequency,
                Param::Gain => &mut v.gain,
            })
    }
}

impl Default for SoftwareGraph {
    fn default() -> Self {
        Self::new(crate::DEFAULT_SAMPLE_RATE as f64)
    }
}

impl SynthesisBackend for SoftwareGraph {
    fn create_voice(&mut self, waveform: Waveform, channel: Channel) -> VoiceId {
        self.voices.push(Voice {
            waveform,
            channel,
            phase: 0.0,
            frequency: Automation::new(0.0),
            gain: Automation::new(0.0),
            stopped: false,
        });
        self.voices.len() - 1
    }

    fn set_target(&mut self, voice: VoiceId, param: Param, value: f64, time_constant_s: f64) {
        let sr = self.sample_rate;
        if let Some(automation) = self.automation(voice, param) {
            automation.set_target(value, time_constant_s, sr);
        }
    }

    fn linear_ramp(&mut self, voice: VoiceId, param: Param, value: f64, duration_s: f64) {
        let sr = self.sample_rate;
        if let Some(automation) = self.automation(voice, param) {
            automation.linear(value, duration_s, sr);
        }
    }

    fn stop(&mut self, voice: VoiceId) {
        if let Some(v) = self.voices.get_mut(voice) {
            v.stopped = true;
        }
    }

    fn is_stopped(&self, voice: VoiceId) -> bool {
        self.voices.get(voice).map_or(true, |v| v.stopped)
    }

    fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate
    }
}

// =============================================================================
// WAV SINK
// =============================================================================

/// Writes rendered stereo frames as 16-bit PCM
pub struct WavSink {
    writer: WavWriter<BufWriter<File>>,
    frames: u64,
}

impl WavSink {
    pub fn create(path: impl AsRef<Path>, sample_rate: u32) -> DrrResult<Self> {
        let spec = WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        Ok(Self {
            writer: WavWriter::create(path, spec)?,
            frames: 0,
        })
    }

    pub fn write(&mut self, frames: &[[f32; 2]]) -> DrrResult<()> {
        for frame in frames {
            for sample in frame {
                let scaled = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                self.writer.write_sample(scaled)?;
            }
        }
        self.frames += frames.len() as u64;
        Ok(())
    }

    /// Flush the header; returns frames written
    pub fn finalize(self) -> DrrResult<u64> {
        let frames = self.frames;
        self.writer.finalize()?;
        Ok(frames)
    }
}

impl std::fmt::Debug for WavSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WavSink").field("frames", &self.frames).finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
