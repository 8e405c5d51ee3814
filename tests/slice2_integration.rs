//! Integration tests for Slice 2
//!
//! Tests the stability → focus path: variance dwell, time collapse and the
//! Focus 12 → 15 → 21 gates, driven on a simulated 250 ms tick.

use drr::core::{FocusInputs, FocusStateMachine, StabilityTracker};
use drr::types::{EngineMetrics, FocusState, ReasonCode};
use drr::{COLLAPSE_DWELL_MS, FOCUS21_MIN_STABILITY_SECS};

const TICK_MS: u64 = 250;

fn coherent_metrics() -> EngineMetrics {
    EngineMetrics {
        spectral_phase_stability: 0.8,
        vibrational_coherence: 0.95,
        golden_ratio_alignment: 0.0,
        amplitude_variance: 0.001,
        breath_rhythm: 0.01,
        harmonic_convergence: true,
    }
}

struct Pipeline {
    stability: StabilityTracker,
    focus: FocusStateMachine,
}

impl Pipeline {
    fn new() -> Self {
        Self {
            stability: StabilityTracker::default(),
            focus: FocusStateMachine::new(),
        }
    }

    fn tick(&mut self, metrics: EngineMetrics, now_ms: u64) -> (FocusState, ReasonCode, bool) {
        let update = self.stability.observe(metrics.amplitude_variance, now_ms);
        let decision = self.focus.evaluate(
            &FocusInputs {
                metrics,
                collapse: update.state,
                collapse_triggered: update.collapse_triggered,
            },
            now_ms,
        );
        (decision.state, decision.reason, decision.transition.is_some())
    }
}

/// Test the full progression on a steady coherent signal
#[test]
fn test_progression_to_focus_21() {
    let mut pipeline = Pipeline::new();
    let mut transitions = Vec::new();

    let mut now = 0;
    while now <= 130_000 {
        let (state, reason, changed) = pipeline.tick(coherent_metrics(), now);
        if changed {
            transitions.push((now, state, reason));
        }
        now += TICK_MS;
    }

    assert_eq!(
        transitions,
        vec![
            (COLLAPSE_DWELL_MS, FocusState::Focus15, ReasonCode::R005_TRANSITION_TO_FOCUS_15),
            (
                (FOCUS21_MIN_STABILITY_SECS + 1) * 1000,
                FocusState::Focus21,
                ReasonCode::R005_TRANSITION_TO_FOCUS_21
            ),
        ]
    );
    assert_eq!(pipeline.focus.transition_count(), 2);
}

/// Test that a single variance spike restarts the dwell
#[test]
fn test_spike_restarts_dwell() {
    let mut pipeline = Pipeline::new();
    let mut spiked = coherent_metrics();
    spiked.amplitude_variance = 0.01;

    let mut collapse_at = None;
    let mut now = 0;
    while now <= 90_000 && collapse_at.is_none() {
        let metrics = if now == 30_000 { spiked } else { coherent_metrics() };
        let (state, reason, _) = pipeline.tick(metrics, now);
        if now == 30_000 {
            assert_eq!(pipeline.stability.state().stability_duration_secs, 0);
            assert_eq!(state, FocusState::Focus12);
            assert_eq!(reason, ReasonCode::R002_STATE_FOCUS_12);
        }
        if state == FocusState::Focus15 {
            collapse_at = Some(now);
        }
        now += TICK_MS;
    }

    // the run restarts on the first tick after the spike
    assert_eq!(collapse_at, Some(30_000 + TICK_MS + COLLAPSE_DWELL_MS));
}

/// Test that silence breaks the run but not an active collapse
#[test]
fn test_silence_breaks_run() {
    let mut tracker = StabilityTracker::default();
    tracker.observe(0.0, 0);
    tracker.observe(0.0, 10_000);
    let update = tracker.observe_silence();
    assert!(update.run_reset);
    assert_eq!(update.state.stable_since_ms, None);
    assert_eq!(tracker.variance_history().len(), 3);

    tracker.observe(0.0, 20_000);
    let update = tracker.observe(0.0, 20_000 + COLLAPSE_DWELL_MS);
    assert!(update.collapse_triggered);
    tracker.observe_silence();
    assert!(tracker.is_active());
}

/// Test that Focus 15 holds while coherence is below the gate
#[test]
fn test_focus_15_holds_below_coherence_gate() {
    let mut pipeline = Pipeline::new();
    let mut weak = coherent_metrics();
    weak.vibrational_coherence = 0.85;

    let last = (0..=800)
        .map(|k| pipeline.tick(weak, k * TICK_MS))
        .last()
        .unwrap();
    assert_eq!(last.0, FocusState::Focus15);
    assert_eq!(last.1, ReasonCode::R004_COHERENCE_BELOW_GATE);
}

/// Test that states never move backwards without the operator
#[test]
fn test_no_automatic_regression() {
    let mut pipeline = Pipeline::new();
    let mut now = 0;
    while pipeline.focus.state() != FocusState::Focus21 {
        pipeline.tick(coherent_metrics(), now);
        now += TICK_MS;
    }

    let mut noisy = coherent_metrics();
    noisy.amplitude_variance = 0.5;
    noisy.vibrational_coherence = 0.1;
    noisy.harmonic_convergence = false;
    for _ in 0..100 {
        let (state, reason, changed) = pipeline.tick(noisy, now);
        assert_eq!(state, FocusState::Focus21);
        assert_eq!(reason, ReasonCode::R002_STATE_FOCUS_21);
        assert!(!changed);
        now += TICK_MS;
    }

    let event = pipeline.focus.reset(now, noisy).unwrap();
    assert_eq!(event.from, FocusState::Focus21);
    assert_eq!(event.to, FocusState::Focus12);
    assert_eq!(event.reason, ReasonCode::R005_OPERATOR_RESET);
}

/// Test that training modes are never evaluated
#[test]
fn test_training_mode_is_sticky() {
    let mut pipeline = Pipeline::new();
    pipeline.focus.force(FocusState::CrlMemory, 0, coherent_metrics()).unwrap();

    let mut now = 0;
    while now <= 130_000 {
        let (state, reason, changed) = pipeline.tick(coherent_metrics(), now);
        assert_eq!(state, FocusState::CrlMemory);
        assert_eq!(reason, ReasonCode::R002_STATE_TRAINING);
        assert!(!changed);
        now += TICK_MS;
    }
    // the stability tracker still ran underneath
    assert!(pipeline.stability.is_active());
}
