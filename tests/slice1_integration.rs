//! Integration tests for Slice 1
//!
//! Tests the full path: capture → SpectralAnalyzer → MetricsComputer

use drr::config::AnalyserConfig;
use drr::core::{CaptureSource, FrameCapture, MetricsComputer, SpectralAnalyzer, ToneCapture};
use drr::types::SpectralPeaks;
use drr::{DEFAULT_SAMPLE_RATE, MAX_PEAKS};

const SR: f32 = DEFAULT_SAMPLE_RATE;

/// A 4096-bin frame on the analyser floor with peaks at the given bins
fn frame_with_peaks(peaks: &[(usize, f32)]) -> Vec<f32> {
    let mut frame = vec![-90.0f32; 4096];
    for &(bin, db) in peaks {
        frame[bin] = db;
    }
    frame
}

fn bin_hz(bin: usize) -> f64 {
    bin as f64 / 4096.0 * SR as f64 / 2.0
}

/// Test the full slice 1 path on a harmonic frame
#[test]
fn test_harmonic_frame_to_metrics() {
    let analyzer = SpectralAnalyzer::new();
    let mut metrics = MetricsComputer::default();

    let frame = frame_with_peaks(&[(8, -20.0), (16, -25.0), (24, -30.0)]);
    let peaks = analyzer.extract(&frame, SR);

    assert_eq!(peaks.len(), 3);
    let freqs = peaks.frequencies();
    assert!((freqs[0] - bin_hz(8)).abs() < 1e-9);
    assert!((freqs[2] - bin_hz(24)).abs() < 1e-9);
    // strongest first
    assert!(peaks.amplitudes().windows(2).all(|w| w[0] >= w[1]));
    assert!((peaks.amplitudes()[0] - 0.1).abs() < 1e-6);

    let m = metrics.compute(&peaks);
    assert!((m.vibrational_coherence - 1.0).abs() < 1e-9);
    // consecutive synthetic phases differ by 0.8 rad
    let expected_phase = 1.0 - 0.8 / std::f64::consts::PI;
    assert!((m.spectral_phase_stability - expected_phase).abs() < 1e-9);
    assert!(m.harmonic_convergence);
    assert_eq!(m.amplitude_variance, 0.0);
    assert_eq!(m.golden_ratio_alignment, 0.0);
}

/// Test that a golden-ratio pair is scored
#[test]
fn test_golden_pair_alignment() {
    let analyzer = SpectralAnalyzer::new();
    let mut metrics = MetricsComputer::default();

    let frame = frame_with_peaks(&[(100, -20.0), (162, -22.0)]);
    let m = metrics.compute(&analyzer.extract(&frame, SR));

    assert!(m.golden_ratio_alignment > 0.99, "alignment {}", m.golden_ratio_alignment);
    // two peaks: phase stability needs at least three
    assert_eq!(m.spectral_phase_stability, 0.0);
    assert!(!m.harmonic_convergence);
}

/// Test that peaks below the floor and plateaus are ignored
#[test]
fn test_floor_and_plateau_rejected() {
    let analyzer = SpectralAnalyzer::new();

    let below_floor = frame_with_peaks(&[(50, -61.0)]);
    assert!(analyzer.extract(&below_floor, SR).is_empty());

    let plateau = frame_with_peaks(&[(50, -20.0), (51, -20.0)]);
    assert!(analyzer.extract(&plateau, SR).is_empty());
}

/// Test that a crowded spectrum keeps only the strongest peaks
#[test]
fn test_peak_cap() {
    let analyzer = SpectralAnalyzer::new();
    let peaks: Vec<(usize, f32)> = (0..30).map(|k| (10 + k * 10, -50.0 + k as f32)).collect();
    let extracted = analyzer.extract(&frame_with_peaks(&peaks), SR);

    assert_eq!(extracted.len(), MAX_PEAKS);
    // the last bin written is the loudest
    assert!((extracted.frequencies()[0] - bin_hz(300)).abs() < 1e-9);
}

/// Test that a silent tick yields zero metrics without touching history
#[test]
fn test_silence_leaves_history_untouched() {
    let analyzer = SpectralAnalyzer::new();
    let mut metrics = MetricsComputer::default();

    let frame = frame_with_peaks(&[(8, -20.0), (16, -25.0), (24, -30.0)]);
    metrics.compute(&analyzer.extract(&frame, SR));
    assert_eq!(metrics.amplitude_history().len(), 1);

    let silent = analyzer.extract(&frame_with_peaks(&[]), SR);
    assert!(silent.is_empty());
    let m = metrics.compute(&silent);
    assert_eq!(m.vibrational_coherence, 0.0);
    assert!(!m.harmonic_convergence);
    assert_eq!(metrics.amplitude_history().len(), 1);

    let m = metrics.compute(&SpectralPeaks::empty());
    assert_eq!(m.amplitude_variance, 0.0);
}

/// Test that amplitude swings show up as variance
#[test]
fn test_amplitude_swings_raise_variance() {
    let analyzer = SpectralAnalyzer::new();
    let mut metrics = MetricsComputer::default();

    let mut last = 0.0;
    for k in 0..10 {
        let db = if k % 2 == 0 { -10.0 } else { -40.0 };
        let frame = frame_with_peaks(&[(8, db), (16, db - 5.0), (24, db - 10.0)]);
        last = metrics.compute(&analyzer.extract(&frame, SR)).amplitude_variance;
    }
    assert!(last > 0.0);
}

/// Test the live path: synthesized harmonic capture → peaks → metrics
#[test]
fn test_tone_capture_harmonic_stack() {
    let config = AnalyserConfig::default();
    // bin-centred fundamental: bin 80 of 4096
    let fundamental = 80.0 * SR / config.fft_size as f32;
    let mut capture = ToneCapture::harmonic(SR, fundamental, 3, 0.5, &config, 7);
    capture.advance(250);

    let mut frame = Vec::new();
    capture.frequency_data(&mut frame);
    assert_eq!(frame.len(), config.bin_count());

    let peaks = SpectralAnalyzer::new().extract(&frame, capture.sample_rate());
    assert_eq!(peaks.len(), 3);
    let dominant = peaks.dominant_frequency().unwrap();
    assert!((dominant - fundamental as f64).abs() < 1e-3, "dominant {}", dominant);

    let m = MetricsComputer::default().compute(&peaks);
    assert!(m.vibrational_coherence > 0.99);
}

/// Test that pushed frames are read until replaced
#[test]
fn test_frame_capture_holds_latest_frame() {
    let (mut capture, feed) = FrameCapture::new(SR, &AnalyserConfig::default());
    let analyzer = SpectralAnalyzer::new();
    let mut frame = Vec::new();

    capture.frequency_data(&mut frame);
    assert!(analyzer.extract(&frame, SR).is_empty());

    assert!(feed.push(frame_with_peaks(&[(40, -30.0)])));
    for _ in 0..3 {
        capture.frequency_data(&mut frame);
        assert_eq!(analyzer.extract(&frame, SR).len(), 1);
    }

    capture.release();
    capture.frequency_data(&mut frame);
    assert!(analyzer.extract(&frame, SR).is_empty());
}
