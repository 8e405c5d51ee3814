//! Integration tests for Slice 3
//!
//! Tests the synthesis path: metrics → AudioConfig → SoftwareGraph → WAV

use drr::config::BeatSplit;
use drr::core::{
    plan_audio_config, AudioSynthesisController, MemorySignal, Param, SoftwareGraph,
    SynthesisBackend, SynthesisInputs, WavSink,
};
use drr::types::{EngineMetrics, TimeCollapseState};
use drr::{COLLAPSE_DESCENT_MS, INFRASONIC_LAYER_LEVEL};

const SR: f64 = 44_100.0;

fn inputs(coherence: f64, dominant: Option<f64>) -> SynthesisInputs {
    SynthesisInputs {
        metrics: EngineMetrics {
            vibrational_coherence: coherence,
            ..EngineMetrics::zero()
        },
        dominant_frequency: dominant,
        collapse: TimeCollapseState::default(),
        memory: MemorySignal::default(),
    }
}

fn collapsed(duration_secs: u64) -> SynthesisInputs {
    SynthesisInputs {
        collapse: TimeCollapseState {
            active: true,
            stable_since_ms: Some(0),
            stability_duration_secs: duration_secs,
        },
        memory: MemorySignal {
            dominant_frequency: Some(128.0),
            amplitude_variance: 0.02,
        },
        ..inputs(1.0, Some(300.0))
    }
}

fn render(graph: &mut SoftwareGraph, seconds: f64) -> Vec<[f32; 2]> {
    let mut block = vec![[0.0f32; 2]; (seconds * SR) as usize];
    graph.render(&mut block);
    block
}

/// Test that coherence narrows the beat and the carrier tracks the peak
#[test]
fn test_baseline_tracking() {
    let config = plan_audio_config(&inputs(0.75, Some(220.0)), BeatSplit::Upper, COLLAPSE_DESCENT_MS);
    assert_eq!(config.carrier_freq, 220.0);
    assert!((config.binaural_beat_hz - 4.0).abs() < 1e-12);
    assert!((config.perceived_beat() - 4.0).abs() < 1e-9);
    assert!(config.infrasonic_pulses.is_none());

    let silent = plan_audio_config(&inputs(0.0, None), BeatSplit::Upper, COLLAPSE_DESCENT_MS);
    assert_eq!(silent.carrier_freq, 440.0);
    assert_eq!(silent.binaural_beat_hz, 10.0);
    assert_eq!(silent.left_channel_hz, 440.0);
    assert_eq!(silent.right_channel_hz, 450.0);
}

/// Test the centred split keeps the perceived beat
#[test]
fn test_centered_split() {
    let config = plan_audio_config(&inputs(0.5, Some(200.0)), BeatSplit::Centered, COLLAPSE_DESCENT_MS);
    assert!((config.left_channel_hz - 197.0).abs() < 1e-9);
    assert!((config.right_channel_hz - 203.0).abs() < 1e-9);
    assert!((config.perceived_beat() - config.binaural_beat_hz).abs() < 1e-9);
}

/// Test the collapse descent from 4 Hz to 0.5 Hz
#[test]
fn test_collapse_descent() {
    let start = plan_audio_config(&collapsed(0), BeatSplit::Upper, COLLAPSE_DESCENT_MS);
    assert_eq!(start.binaural_beat_hz, 4.0);
    assert_eq!(start.carrier_freq, 128.0);
    assert_eq!(start.infrasonic_layer, INFRASONIC_LAYER_LEVEL);
    assert!((start.modulation_rhythm - 0.2).abs() < 1e-12);
    assert_eq!(start.infrasonic_pulses.as_ref().map(Vec::len), Some(2));

    let mid = plan_audio_config(&collapsed(90), BeatSplit::Upper, COLLAPSE_DESCENT_MS);
    assert!((mid.binaural_beat_hz - 2.25).abs() < 1e-12);
    assert_eq!(mid.collapse_progress, Some(0.5));

    let end = plan_audio_config(&collapsed(600), BeatSplit::Upper, COLLAPSE_DESCENT_MS);
    assert!((end.binaural_beat_hz - 0.5).abs() < 1e-12);
    assert_eq!(end.collapse_progress, Some(1.0));
}

/// Test that the controller glides the voices toward each target
#[test]
fn test_controller_glides_voices() {
    let mut controller = AudioSynthesisController::new(SoftwareGraph::new(SR));
    controller.start();
    assert!(controller.is_running());

    controller.update(&inputs(0.5, Some(300.0)), 0.0);
    let graph = controller.backend_mut();
    assert_eq!(graph.target(0, Param::Frequency), Some(300.0));
    assert_eq!(graph.target(1, Param::Frequency), Some(306.0));

    let block = render(graph, 1.0);
    assert!((graph.value(0, Param::Frequency).unwrap() - 300.0).abs() < 0.01);
    assert!((graph.value(1, Param::Frequency).unwrap() - 306.0).abs() < 0.01);
    // audible and within range
    let peak = block.iter().flat_map(|f| f.iter()).fold(0.0f32, |m, s| m.max(s.abs()));
    assert!(peak > 0.05 && peak <= 1.0, "peak {}", peak);
}

/// Test that the infrasonic layer fades in on collapse and out after
#[test]
fn test_infrasonic_layer_lifecycle() {
    let mut controller = AudioSynthesisController::new(SoftwareGraph::new(SR));
    controller.start();

    controller.update(&collapsed(10), 0.0);
    let voices = controller.infrasonic_voices().to_vec();
    assert_eq!(voices.len(), 2);
    // repeated collapse ticks do not stack voices
    controller.update(&collapsed(11), 0.0);
    assert_eq!(controller.infrasonic_voices(), voices.as_slice());

    let graph = controller.backend_mut();
    render(graph, 0.25);
    let halfway = graph.value(voices[0], Param::Gain).unwrap();
    assert!((halfway - INFRASONIC_LAYER_LEVEL * 0.5 * 0.5).abs() < 1e-3, "gain {}", halfway);
    render(graph, 0.5);
    assert!((graph.value(voices[0], Param::Gain).unwrap() - 0.45).abs() < 1e-9);

    controller.update(&inputs(0.5, Some(300.0)), 0.0);
    assert!(controller.infrasonic_voices().is_empty());
    let graph = controller.backend_mut();
    render(graph, 0.6);
    assert_eq!(graph.value(voices[0], Param::Gain), Some(0.0));

    controller.stop();
    assert!(voices.iter().all(|v| controller.backend().is_stopped(*v)));
}

/// Test that teardown is idempotent and silences every voice
#[test]
fn test_stop_idempotent() {
    let mut controller = AudioSynthesisController::new(SoftwareGraph::new(SR));
    controller.start();
    controller.update(&collapsed(5), 0.4);
    assert_eq!(controller.backend().live_voices(), 5);

    controller.stop();
    controller.stop();
    assert!(!controller.is_running());
    assert_eq!(controller.backend().live_voices(), 0);
    assert_eq!(controller.current().carrier_freq, 440.0);

    let block = render(controller.backend_mut(), 0.1);
    assert!(block.iter().all(|f| f[0] == 0.0 && f[1] == 0.0));
}

/// Test the rendered output round-trips through a WAV file
#[test]
fn test_render_to_wav() {
    let path = std::env::temp_dir().join(format!("drr-slice3-{}.wav", std::process::id()));

    let mut controller = AudioSynthesisController::new(SoftwareGraph::new(SR));
    controller.start();
    controller.update(&inputs(0.9, Some(200.0)), 0.0);

    let mut sink = WavSink::create(&path, SR as u32).unwrap();
    for _ in 0..5 {
        let block = render(controller.backend_mut(), 0.1);
        sink.write(&block).unwrap();
    }
    let frames = sink.finalize().unwrap();
    assert_eq!(frames, 5 * 4410);

    let reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.spec().channels, 2);
    assert_eq!(reader.spec().sample_rate, 44_100);
    assert_eq!(reader.duration(), 5 * 4410);
    std::fs::remove_file(&path).ok();
}
