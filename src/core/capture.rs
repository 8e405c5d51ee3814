//! Capture layer: sources of dB magnitude frames
//!
//! `SpectrumAnalyser` turns a sample stream into the same frames a browser
//! analyser node exposes: Blackman window, |X|/N, exponential smoothing,
//! decibels floored at `min_decibels`.

use std::collections::VecDeque;
use std::f32::consts::PI;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::config::AnalyserConfig;
use crate::CaptureError;

/// Input contract: a live stream of magnitude frames
pub trait CaptureSource: Send + Sync + fmt::Debug {
    fn sample_rate(&self) -> f32;

    /// Overwrite `out` with the current dB frame (fft/2 bins)
    fn frequency_data(&mut self, out: &mut Vec<f32>);

    /// Let `elapsed_ms` of input flow in. Live sources ignore this.
    fn advance(&mut self, _elapsed_ms: u64) {}

    /// Release the underlying device. Idempotent.
    fn release(&mut self);

    fn is_released(&self) -> bool;
}

/// What a session start receives from capture acquisition
pub type CaptureResult = Result<Box<dyn CaptureSource>, CaptureError>;

// =============================================================================
// SPECTRUM ANALYSER
// =============================================================================

pub struct SpectrumAnalyser {
    fft: Arc<dyn Fft<f32>>,
    fft_buffer: Vec<Complex<f32>>,
    window: Vec<f32>,
    samples: VecDeque<f32>,
    smoothed: Vec<f32>,
    smoothing: f32,
    min_db: f32,
}

impl SpectrumAnalyser {
    pub fn new(config: &AnalyserConfig) -> Self {
        let n = config.fft_size;
        let fft = FftPlanner::new().plan_fft_forward(n);

        // Blackman window
        let window = (0..n)
            .map(|i| {
                let x = 2.0 * PI * i as f32 / n as f32;
                0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
            })
            .collect();

        Self {
            fft,
            fft_buffer: vec![Complex::new(0.0, 0.0); n],
            window,
            samples: std::iter::repeat(0.0).take(n).collect(),
            smoothed: vec![0.0; n / 2],
            smoothing: config.smoothing,
            min_db: config.min_decibels,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.window.len()
    }

    pub fn bin_count(&self) -> usize {
        self.smoothed.len()
    }

    /// Append time-domain samples; only the newest fft_size are kept
    pub fn push_samples(&mut self, samples: &[f32]) {
        let n = self.fft_size();
        let start = samples.len().saturating_sub(n);
        for &s in &samples[start..] {
            if self.samples.len() == n {
                self.samples.pop_front();
            }
            self.samples.push_back(s);
        }
    }

    /// Transform the current window into a smoothed dB frame
    pub fn frequency_data(&mut self, out: &mut Vec<f32>) {
        let n = self.fft_size();
        for ((slot, sample), w) in self.fft_buffer.iter_mut().zip(&self.samples).zip(&self.window) {
            *slot = Complex::new(sample * w, 0.0);
        }
        self.fft.process(&mut self.fft_buffer);

        out.clear();
        out.reserve(self.smoothed.len());
        for (k, prev) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.fft_buffer[k].norm() / n as f32;
            *prev = self.smoothing * *prev + (1.0 - self.smoothing) * magnitude;
            out.push((20.0 * prev.log10()).max(self.min_db));
        }
    }

    /// Frame of pure floor values
    pub fn silent_frame(&self, out: &mut Vec<f32>) {
        out.clear();
        out.resize(self.bin_count(), self.min_db);
    }
}

impl fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("fft_size", &self.fft_size())
            .field("smoothing", &self.smoothing)
            .field("min_db", &self.min_db)
            .finish()
    }
}

fn samples_for(elapsed_ms: u64, sample_rate: f32) -> usize {
    (elapsed_ms as f64 * sample_rate as f64 / 1000.0).round() as usize
}

// =============================================================================
// TONE CAPTURE
// =============================================================================

/// Sine partial of a synthetic signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency: f32,
    pub amplitude: f32,
}

impl Tone {
    /// Partials k·f0 at amplitude/k, at least one
    pub fn harmonic_series(fundamental: f32, partials: usize, amplitude: f32) -> Vec<Tone> {
        (1..=partials.max(1))
            .map(|k| Tone {
                frequency: fundamental * k as f32,
                amplitude: amplitude / k as f32,
            })
            .collect()
    }
}

/// Deterministic synthetic input: a sum of sines plus optional seeded noise
#[derive(Debug)]
pub struct ToneCapture {
    sample_rate: f32,
    tones: Vec<Tone>,
    noise: f32,
    rng: StdRng,
    analyser: SpectrumAnalyser,
    /// Absolute sample index of the next generated sample
    position: u64,
    scratch: Vec<f32>,
    released: bool,
}

impl ToneCapture {
    pub fn new(sample_rate: f32, tones: Vec<Tone>, config: &AnalyserConfig, seed: u64) -> Self {
        Self {
            sample_rate,
            tones,
            noise: 0.0,
            rng: StdRng::seed_from_u64(seed),
            analyser: SpectrumAnalyser::new(config),
            position: 0,
            scratch: Vec::new(),
            released: false,
        }
    }

    /// Add uniform noise in [-level, level]
    pub fn with_noise(mut self, level: f32) -> Self {
        self.noise = level.abs();
        self
    }

    /// Harmonic stack on `fundamental`: partial k at amplitude `amplitude / k`
    pub fn harmonic(sample_rate: f32, fundamental: f32, partials: usize, amplitude: f32, config: &AnalyserConfig, seed: u64) -> Self {
        Self::new(sample_rate, Tone::harmonic_series(fundamental, partials, amplitude), config, seed)
    }
}

impl CaptureSource for ToneCapture {
    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn frequency_data(&mut self, out: &mut Vec<f32>) {
        if self.released {
            self.analyser.silent_frame(out);
        } else {
            self.analyser.frequency_data(out);
        }
    }

    fn advance(&mut self, elapsed_ms: u64) {
        if self.released {
            return;
        }
        let count = samples_for(elapsed_ms, self.sample_rate);
        // samples older than one window never reach the analyser
        let keep = count.min(self.analyser.fft_size());
        let first = self.position + (count - keep) as u64;

        self.scratch.clear();
        for idx in first..first + keep as u64 {
            let t = idx as f64 / self.sample_rate as f64;
            let mut s: f64 = self
                .tones
                .iter()
                .map(|tone| tone.amplitude as f64 * (std::f64::consts::TAU * tone.frequency as f64 * t).sin())
                .sum();
            if self.noise > 0.0 {
                s += self.rng.gen_range(-self.noise..=self.noise) as f64;
            }
            self.scratch.push(s as f32);
        }
        self.analyser.push_samples(&self.scratch);
        self.position += count as u64;
    }

    fn release(&mut self) {
        self.released = true;
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

// =============================================================================
// WAV CAPTURE
// =============================================================================

/// Recorded input, mixed to mono and streamed as time advances
#[derive(Debug)]
pub struct WavCapture {
    sample_rate: f32,
    samples: Vec<f32>,
    position: usize,
    analyser: SpectrumAnalyser,
    released: bool,
}

impl WavCapture {
    /// Open a WAV file. A missing file maps to `DeviceNotFound`.
    pub fn open(path: impl AsRef<Path>, config: &AnalyserConfig) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        let reader = hound::WavReader::open(path).map_err(|e| match e {
            hound::Error::IoError(io) if io.kind() == std::io::ErrorKind::NotFound => {
                CaptureError::DeviceNotFound(path.display().to_string())
            }
            hound::Error::IoError(io) if io.kind() == std::io::ErrorKind::PermissionDenied => {
                CaptureError::PermissionDenied
            }
            other => CaptureError::Unsupported(other.to_string()),
        })?;

        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;
        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(|e| CaptureError::Unsupported(e.to_string()))?,
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1) as u32)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()
                    .map_err(|e| CaptureError::Unsupported(e.to_string()))?
            }
        };

        let samples = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        Ok(Self::from_samples(spec.sample_rate as f32, samples, config))
    }

    /// Mono samples already in memory
    pub fn from_samples(sample_rate: f32, samples: Vec<f32>, config: &AnalyserConfig) -> Self {
        Self {
            sample_rate,
            samples,
            position: 0,
            analyser: SpectrumAnalyser::new(config),
            released: false,
        }
    }

    /// Length of the recording
    pub fn duration_ms(&self) -> u64 {
        (self.samples.len() as f64 * 1000.0 / self.sample_rate as f64) as u64
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.samples.len()
    }
}

impl CaptureSource for WavCapture {
    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn frequency_data(&mut self, out: &mut Vec<f32>) {
        if self.released {
            self.analyser.silent_frame(out);
        } else {
            self.analyser.frequency_data(out);
        }
    }

    fn advance(&mut self, elapsed_ms: u64) {
        if self.released {
            return;
        }
        let count = samples_for(elapsed_ms, self.sample_rate);
        let end = (self.position + count).min(self.samples.len());
        let available = &self.samples[self.position.min(end)..end];
        self.analyser.push_samples(available);

        // past the end of the file the input is silence
        let missing = count - available.len();
        if missing > 0 {
            let zeros = vec![0.0; missing.min(self.analyser.fft_size())];
            self.analyser.push_samples(&zeros);
        }
        self.position = end;
    }

    fn release(&mut self) {
        self.released = true;
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

// =============================================================================
// FRAME CAPTURE
// =============================================================================

/// Writer half of a `FrameCapture`
#[derive(Debug, Clone)]
pub struct FrameFeed {
    slot: Arc<Mutex<Option<Vec<f32>>>>,
}

impl FrameFeed {
    /// Replace the current frame; returns false if the lock is poisoned
    pub fn push(&self, frame: Vec<f32>) -> bool {
        match self.slot.lock() {
            Ok(mut slot) => {
                *slot = Some(frame);
                true
            }
            Err(_) => false,
        }
    }
}

/// Externally supplied dB frames. The latest frame is read on every tick
/// until replaced, like a live analyser.
#[derive(Debug)]
pub struct FrameCapture {
    sample_rate: f32,
    bins: usize,
    floor_db: f32,
    slot: Arc<Mutex<Option<Vec<f32>>>>,
    released: bool,
}

impl FrameCapture {
    pub fn new(sample_rate: f32, config: &AnalyserConfig) -> (Self, FrameFeed) {
        let slot = Arc::new(Mutex::new(None));
        let capture = Self {
            sample_rate,
            bins: config.bin_count(),
            floor_db: config.min_decibels,
            slot: Arc::clone(&slot),
            released: false,
        };
        (capture, FrameFeed { slot })
    }
}

impl CaptureSource for FrameCapture {
    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn frequency_data(&mut self, out: &mut Vec<f32>) {
        out.clear();
        let frame = if self.released {
            None
        } else {
            self.slot.lock().ok().and_then(|slot| slot.clone())
        };
        match frame {
            Some(frame) => out.extend_from_slice(&frame),
            None => out.resize(self.bins, self.floor_db),
        }
    }

    fn release(&mut self) {
        self.released = true;
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

// =============================================================================
// TESTS
// =============================================================================
