//! DrrEngine: the single owned session state, advanced once per tick
//!
//! Tick order: spectral → metrics → resonance nodes → stability → focus
//! → foresight / creative flow → synthesis → snapshot.
//!
//! The capture source and synthesis backend are owned for the session's
//! lifetime and released by `stop`, which also runs on drop.

use std::f64::consts::TAU;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, trace, warn};

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::core::capture::{CaptureResult, CaptureSource};
use crate::core::creative::CreativeFlowScheduler;
use crate::core::focus::{FocusInputs, FocusStateMachine};
use crate::core::foresight::IntuitiveForesightDetector;
use crate::core::metrics::MetricsComputer;
use crate::core::render::{SoftwareGraph, SynthesisBackend};
use crate::core::resonance::{layout, ResonanceNodeGenerator};
use crate::core::spectral::SpectralAnalyzer;
use crate::core::stability::StabilityTracker;
use crate::core::synthesis::{AudioSynthesisController, MemorySignal, SynthesisInputs};
use crate::types::{
    AtemporalEvent, CaptureStatus, DrrMemory, EngineMetrics, EngineSnapshot, FocusState,
    ReasonCode, ResonanceGeometry, ResonanceNode, SessionLogEntry, SessionRecord, SpectralPeaks,
    SymbolicPattern, TransitionEvent,
};
use crate::{DrrError, DrrResult, DEFAULT_SAMPLE_RATE};

/// Randomized timestamps of atemporal events spread over a 10-minute window
const ATEMPORAL_JITTER_MS: i64 = 5 * 60 * 1000;

/// Operator control surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Jump to a state, bypassing every gate. Forcing Focus 12 also
    /// restarts the stability tracker.
    Force(FocusState),
    /// Back to Focus 12 with a fresh stability tracker
    Reset,
    SetCapture(bool),
    Stop,
}

impl FromStr for OperatorCommand {
    type Err = DrrError;

    /// `force focus21`, `force CRL-T`, `reset`, `capture on|off`, `stop`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let verb = words.next().unwrap_or_default().to_ascii_lowercase();
        let rest = words.collect::<Vec<_>>().join(" ");

        match verb.as_str() {
            "force" => rest
                .parse::<FocusState>()
                .map(OperatorCommand::Force)
                .map_err(DrrError::Session),
            "reset" => Ok(OperatorCommand::Reset),
            "stop" => Ok(OperatorCommand::Stop),
            "capture" => match rest.to_ascii_lowercase().as_str() {
                "on" | "true" | "enable" => Ok(OperatorCommand::SetCapture(true)),
                "off" | "false" | "disable" => Ok(OperatorCommand::SetCapture(false)),
                other => Err(DrrError::Session(format!("capture expects on/off, got '{}'", other))),
            },
            _ => Err(DrrError::Session(format!("unknown command: '{}'", s.trim()))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Running,
    Stopped,
}

/// The DRR engine
#[derive(Debug)]
pub struct DrrEngine<B: SynthesisBackend = SoftwareGraph> {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    rng: StdRng,
    phase: SessionPhase,

    capture: Option<Box<dyn CaptureSource>>,
    capture_enabled: bool,
    frame: Vec<f32>,

    spectral: SpectralAnalyzer,
    metrics: MetricsComputer,
    resonance: ResonanceNodeGenerator,
    stability: StabilityTracker,
    focus: FocusStateMachine,
    creative: CreativeFlowScheduler,
    foresight: IntuitiveForesightDetector,
    synthesis: AudioSynthesisController<B>,

    tick: u64,
    started_at_ms: u64,
    last_tick_ms: Option<u64>,
    last_advance_ms: Option<u64>,
    current_phase: f64,
    last_metrics: EngineMetrics,

    snapshot: EngineSnapshot,
    transitions: Vec<TransitionEvent>,
    session_log: Vec<SessionRecord>,
}

impl<B: SynthesisBackend> DrrEngine<B> {
    pub fn new(config: EngineConfig, clock: Arc<dyn Clock>, backend: B) -> DrrResult<Self> {
        config.validate()?;
        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            clock,
            phase: SessionPhase::Idle,
            capture: None,
            capture_enabled: false,
            frame: Vec::with_capacity(config.analyser.bin_count()),
            spectral: SpectralAnalyzer::from_config(&config),
            metrics: MetricsComputer::new(config.amplitude_history_cap),
            resonance: ResonanceNodeGenerator::new(config.resonance_memory_cap),
            stability: StabilityTracker::from_config(&config),
            focus: FocusStateMachine::from_config(&config),
            creative: CreativeFlowScheduler::new(config.modules.creative_flow),
            foresight: IntuitiveForesightDetector::new(config.modules.intuitive_foresight),
            synthesis: AudioSynthesisController::with_config(backend, &config),
            tick: 0,
            started_at_ms: 0,
            last_tick_ms: None,
            last_advance_ms: None,
            current_phase: 0.0,
            last_metrics: EngineMetrics::zero(),
            snapshot: EngineSnapshot::initial(CaptureStatus::Idle),
            transitions: Vec::new(),
            session_log: Vec::new(),
            config,
        })
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Begin a session with whatever capture acquisition produced.
    ///
    /// A failed acquisition is not an error: the session runs with
    /// capture disabled on empty spectra.
    pub fn start(&mut self, capture: CaptureResult) -> DrrResult<CaptureStatus> {
        if self.phase == SessionPhase::Running {
            return Err(DrrError::Session("session already running".into()));
        }
        self.reset_state();

        let status = match capture {
            Ok(source) => {
                self.capture = Some(source);
                self.capture_enabled = true;
                CaptureStatus::Active
            }
            Err(e) => {
                warn!(error = %e, "capture unavailable, continuing with capture disabled");
                self.capture = None;
                self.capture_enabled = false;
                CaptureStatus::Disabled
            }
        };

        self.synthesis.start();
        self.started_at_ms = self.clock.now_ms();
        self.phase = SessionPhase::Running;
        self.snapshot = EngineSnapshot::initial(status);
        self.snapshot.at_ms = self.started_at_ms;

        info!(capture = ?status, seed = self.config.seed, "DRR session started");
        Ok(status)
    }

    /// Tear down the session. Idempotent.
    pub fn stop(&mut self) {
        if self.phase != SessionPhase::Running {
            return;
        }
        self.synthesis.stop();
        if let Some(mut capture) = self.capture.take() {
            capture.release();
        }
        self.capture_enabled = false;
        self.metrics.reset();
        self.resonance.reset();
        self.stability.reset();
        self.phase = SessionPhase::Stopped;
        self.snapshot.capture = CaptureStatus::Idle;

        info!(ticks = self.tick, transitions = self.transitions.len(), "DRR session stopped");
    }

    fn reset_state(&mut self) {
        let config = &self.config;
        self.rng = StdRng::seed_from_u64(config.seed);
        self.metrics = MetricsComputer::new(config.amplitude_history_cap);
        self.resonance = ResonanceNodeGenerator::new(config.resonance_memory_cap);
        self.stability = StabilityTracker::from_config(config);
        self.focus = FocusStateMachine::from_config(config);
        self.creative = CreativeFlowScheduler::new(config.modules.creative_flow);
        self.foresight = IntuitiveForesightDetector::new(config.modules.intuitive_foresight);
        self.tick = 0;
        self.last_tick_ms = None;
        self.last_advance_ms = None;
        self.current_phase = 0.0;
        self.last_metrics = EngineMetrics::zero();
        self.transitions.clear();
        self.session_log.clear();
    }

    // =========================================================================
    // TICKS
    // =========================================================================

    /// Read the clock, let capture catch up, and tick if the guard allows
    pub fn poll(&mut self) -> Option<EngineSnapshot> {
        if self.phase != SessionPhase::Running {
            return None;
        }
        let now = self.clock.now_ms();
        let elapsed = now.saturating_sub(self.last_advance_ms.unwrap_or(self.started_at_ms));
        if let Some(capture) = self.capture.as_mut() {
            capture.advance(elapsed);
        }
        self.last_advance_ms = Some(now);
        self.tick_at(now)
    }

    /// Run one tick at `now_ms`. Returns `None` when not running or when
    /// the tick falls inside the guard window (dropped, not queued).
    pub fn tick_at(&mut self, now_ms: u64) -> Option<EngineSnapshot> {
        if self.phase != SessionPhase::Running {
            return None;
        }
        if let Some(last) = self.last_tick_ms {
            if now_ms.saturating_sub(last) < self.config.tick_guard_ms {
                trace!(now_ms, last, "tick dropped by guard");
                return None;
            }
        }
        self.last_tick_ms = Some(now_ms);
        Some(self.commit(now_ms))
    }

    fn commit(&mut self, now: u64) -> EngineSnapshot {
        self.tick += 1;

        // spectral
        let (peaks, sample_rate) = match self.capture.as_mut() {
            Some(capture) if self.capture_enabled => {
                capture.frequency_data(&mut self.frame);
                let sr = capture.sample_rate();
                (self.spectral.extract(&self.frame, sr), sr)
            }
            _ => (SpectralPeaks::empty(), DEFAULT_SAMPLE_RATE),
        };
        let silent = peaks.is_empty();

        // metrics
        let metrics = self.metrics.compute(&peaks);
        self.last_metrics = metrics;

        // resonance nodes
        let nodes = if self.config.modules.memory_stream {
            self.resonance.generate(&peaks, self.tick, now)
        } else {
            layout(&peaks, self.tick, now)
        };

        // stability
        let stability = if silent {
            self.stability.observe_silence()
        } else {
            self.stability.observe(metrics.amplitude_variance, now)
        };
        if stability.collapse_triggered {
            info!(at_ms = now, "time collapse triggered");
        }

        // focus
        let decision = self.focus.evaluate(
            &FocusInputs {
                metrics,
                collapse: stability.state,
                collapse_triggered: stability.collapse_triggered,
            },
            now,
        );
        if let Some(event) = decision.transition.clone() {
            self.record_transition(event, &nodes, &peaks);
        }

        // auxiliary modules
        let foresight = self
            .foresight
            .update(metrics.golden_ratio_alignment, metrics.harmonic_convergence, &nodes)
            .clone();
        let creative = self.creative.update(metrics.vibrational_coherence, now, &mut self.rng);

        // synthesis
        let audio_config = self
            .synthesis
            .update(
                &SynthesisInputs {
                    metrics,
                    dominant_frequency: peaks.dominant_frequency(),
                    collapse: stability.state,
                    memory: MemorySignal {
                        dominant_frequency: self.resonance.dominant_memory_frequency(),
                        amplitude_variance: self.resonance.memory_amplitude_variance(),
                    },
                },
                creative.dissonance_level,
            )
            .clone();

        self.current_phase = (self.current_phase + self.config.synthetic_phase_step) % TAU;

        let reason = if decision.reason.is_transition() {
            decision.reason
        } else if silent && !self.capture_enabled {
            ReasonCode::R001_CAPTURE_DISABLED
        } else if silent {
            ReasonCode::R001_NO_SIGNAL
        } else if stability.collapse_triggered {
            ReasonCode::R003_STABILITY_REACHED
        } else if stability.run_reset && decision.reason == ReasonCode::R002_STATE_FOCUS_12 {
            ReasonCode::R003_STABILITY_RESET
        } else {
            decision.reason
        };

        self.snapshot = EngineSnapshot {
            timestamp: Utc::now(),
            tick: self.tick,
            at_ms: now,
            capture: self.capture_status(),
            metrics,
            current_phase: self.current_phase,
            dominant_frequencies: peaks.frequencies(),
            focus_state: decision.state,
            reason,
            time_collapse: stability.state,
            resonance_nodes: nodes,
            resonance_memory_len: self.resonance.memory().len(),
            audio_config,
            creative_flow: creative,
            foresight,
        };

        debug!(
            tick = self.tick,
            sample_rate,
            peaks = peaks.len(),
            coherence = metrics.vibrational_coherence,
            variance = metrics.amplitude_variance,
            state = %decision.state,
            reason = reason.code(),
            "tick"
        );
        self.snapshot.clone()
    }

    // =========================================================================
    // OPERATOR
    // =========================================================================

    /// Apply an operator command; returns the transition it caused, if any
    pub fn apply_command(&mut self, command: OperatorCommand) -> DrrResult<Option<TransitionEvent>> {
        if self.phase != SessionPhase::Running {
            return Err(DrrError::Session("session is not running".into()));
        }
        let now = self.clock.now_ms();
        let nodes = self.snapshot.resonance_nodes.clone();

        let transition = match command {
            OperatorCommand::Force(target) => {
                let event = self.focus.force(target, now, self.last_metrics);
                // Focus 12 only advances on a fresh collapse trigger
                if event.is_some() && target == FocusState::Focus12 {
                    self.stability.reset();
                }
                event
            }
            OperatorCommand::Reset => {
                self.stability.reset();
                self.focus.reset(now, self.last_metrics)
            }
            OperatorCommand::SetCapture(enabled) => {
                if enabled && self.capture.is_none() {
                    warn!("capture requested but no device was acquired");
                }
                self.capture_enabled = enabled && self.capture.is_some();
                self.snapshot.capture = self.capture_status();
                info!(capture = ?self.snapshot.capture, "capture toggled");
                None
            }
            OperatorCommand::Stop => {
                self.stop();
                None
            }
        };

        if let Some(event) = transition.clone() {
            self.snapshot.focus_state = event.to;
            self.snapshot.reason = event.reason;
            self.snapshot.time_collapse = self.stability.state();
            self.record_transition(event, &nodes, &SpectralPeaks::empty());
        }
        Ok(transition)
    }

    fn record_transition(&mut self, event: TransitionEvent, nodes: &[ResonanceNode], peaks: &SpectralPeaks) {
        info!(
            from = %event.from,
            to = %event.to,
            reason = event.reason.code(),
            at_ms = event.at_ms,
            "focus transition"
        );

        let record = if event.reason == ReasonCode::R005_TRANSITION_TO_FOCUS_15 {
            let atemporal = self.atemporal_event(&event, nodes, peaks);
            info!(
                recursion_level = atemporal.symbolic_pattern.recursion_level,
                "atemporal event recorded"
            );
            SessionRecord::Atemporal(atemporal)
        } else {
            SessionRecord::Transition(session_entry(&event, nodes))
        };
        self.session_log.push(record);
        self.transitions.push(event);
    }

    fn atemporal_event(
        &mut self,
        event: &TransitionEvent,
        nodes: &[ResonanceNode],
        peaks: &SpectralPeaks,
    ) -> AtemporalEvent {
        let actual = Utc::now();
        let jitter = self.rng.gen_range(-ATEMPORAL_JITTER_MS..=ATEMPORAL_JITTER_MS);
        let signature = if nodes.is_empty() {
            peaks.frequencies()
        } else {
            nodes.iter().map(|n| n.frequency).collect()
        };

        AtemporalEvent {
            randomized_timestamp: actual + Duration::milliseconds(jitter),
            actual_timestamp: actual,
            at_ms: event.at_ms,
            resonance_signature: signature,
            symbolic_pattern: SymbolicPattern {
                kind: "ontological_break".into(),
                recursion_level: self.rng.gen_range(1..=7),
                mirror_state: true,
                parallax_depth: self.rng.gen_range(0.0..150.0),
            },
            drr_memory: DrrMemory {
                accumulated_variance: self.stability.variance_history().to_vec(),
                trend_prediction: nodes.iter().map(|n| n.amplitude).collect(),
                resonance_history: self.resonance.memory().to_vec(),
            },
            no_time_markers: true,
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Latest committed snapshot
    pub fn snapshot(&self) -> &EngineSnapshot {
        &self.snapshot
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == SessionPhase::Running
    }

    pub fn focus_state(&self) -> FocusState {
        self.focus.state()
    }

    pub fn capture_status(&self) -> CaptureStatus {
        match self.phase {
            SessionPhase::Running if self.capture_enabled => CaptureStatus::Active,
            SessionPhase::Running => CaptureStatus::Disabled,
            _ => CaptureStatus::Idle,
        }
    }

    pub fn transitions(&self) -> &[TransitionEvent] {
        &self.transitions
    }

    pub fn session_log(&self) -> &[SessionRecord] {
        &self.session_log
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn amplitude_history_len(&self) -> usize {
        self.metrics.amplitude_history().len()
    }

    pub fn variance_history_len(&self) -> usize {
        self.stability.variance_history().len()
    }

    pub fn resonance_memory_len(&self) -> usize {
        self.resonance.memory().len()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        self.synthesis.backend()
    }

    pub fn backend_mut(&mut self) -> &mut B {
        self.synthesis.backend_mut()
    }

    pub fn synthesis(&self) -> &AudioSynthesisController<B> {
        &self.synthesis
    }
}

impl<B: SynthesisBackend> Drop for DrrEngine<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Log entry for an ordinary transition
fn session_entry(event: &TransitionEvent, nodes: &[ResonanceNode]) -> SessionLogEntry {
    let m = &event.metrics;
    SessionLogEntry {
        timestamp: Utc::now(),
        at_ms: event.at_ms,
        state_label: event.to,
        reason: event.reason,
        node_frequencies: nodes.iter().map(|n| n.frequency).collect(),
        phase: nodes.iter().map(|n| n.phase).collect(),
        amplitude: nodes.iter().map(|n| n.amplitude).collect(),
        breath_coherence: m.breath_rhythm,
        vibrational_coherence: m.vibrational_coherence,
        spectral_phase_stability: m.spectral_phase_stability,
        resonance_geometry: ResonanceGeometry {
            nodes: nodes.to_vec(),
            mandala_complexity: nodes.len(),
            golden_ratio_alignment: m.golden_ratio_alignment,
        },
    }
}

// =============================================================================
// TESTS
// =============================================================================
