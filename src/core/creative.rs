//! CreativeFlowScheduler: probabilistic dissonance injection
//!
//! While coherence is high and the cooldown has elapsed, each tick has a
//! fixed chance to inject a dissonance burst. Absent injection the level
//! decays linearly toward 0.

use rand::Rng;

use crate::types::CreativeFlowState;
use crate::{
    CREATIVE_FLOW_COHERENCE_GATE, CREATIVE_FLOW_DECAY_PER_TICK, CREATIVE_FLOW_INJECTION_PROBABILITY,
};

/// Burst level range: 0.3 + U[0, 0.4)
const BURST_BASE: f64 = 0.3;
const BURST_SPAN: f64 = 0.4;

/// Cooldown range after a burst: 2000 + U[0, 3000) ms
const COOLDOWN_BASE_MS: f64 = 2000.0;
const COOLDOWN_SPAN_MS: f64 = 3000.0;

#[derive(Debug, Clone)]
pub struct CreativeFlowScheduler {
    state: CreativeFlowState,
}

impl CreativeFlowScheduler {
    pub fn new(enabled: bool) -> Self {
        Self {
            state: CreativeFlowState {
                enabled,
                ..CreativeFlowState::default()
            },
        }
    }

    /// Advance one tick. Random draws happen only once the coherence and
    /// cooldown gates pass, so a seeded source replays exactly.
    pub fn update<R: Rng>(&mut self, coherence: f64, now_ms: u64, rng: &mut R) -> CreativeFlowState {
        let s = &mut self.state;
        if !s.enabled {
            s.dissonance_level = 0.0;
            s.rhythmic_injection = false;
            return *s;
        }

        let inject = now_ms > s.next_injection_eligible_at
            && coherence > CREATIVE_FLOW_COHERENCE_GATE
            && rng.gen::<f64>() < CREATIVE_FLOW_INJECTION_PROBABILITY;

        if inject {
            s.dissonance_level = BURST_BASE + rng.gen::<f64>() * BURST_SPAN;
            s.rhythmic_injection = true;
            let cooldown = COOLDOWN_BASE_MS + rng.gen::<f64>() * COOLDOWN_SPAN_MS;
            s.next_injection_eligible_at = now_ms + cooldown as u64;
        } else {
            s.dissonance_level = (s.dissonance_level - CREATIVE_FLOW_DECAY_PER_TICK).max(0.0);
            s.rhythmic_injection = false;
        }
        *s
    }

    pub fn state(&self) -> CreativeFlowState {
        self.state
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.state.enabled);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn run(seed: u64, coherence: f64, ticks: u64) -> Vec<CreativeFlowState> {
        let mut scheduler = CreativeFlowScheduler::new(true);
        let mut rng = StdRng::seed_from_u64(seed);
        (1..=ticks)
            .map(|t| scheduler.update(coherence, t * 250, &mut rng))
            .collect()
    }

    #[test]
    fn test_low_coherence_never_injects() {
        assert!(run(3, 0.7, 400).iter().all(|s| !s.rhythmic_injection && s.dissonance_level == 0.0));
    }

    #[test]
    fn test_injections_respect_bounds_and_cooldown() {
        let states = run(11, 0.95, 2_000);
        let bursts: Vec<(u64, &CreativeFlowState)> = states
            .iter()
            .enumerate()
            .filter(|(_, s)| s.rhythmic_injection)
            .map(|(i, s)| ((i as u64 + 1) * 250, s))
            .collect();
        assert!(bursts.len() > 10);

        for (at, s) in &bursts {
            assert!((0.3..0.7).contains(&s.dissonance_level));
            let cooldown = s.next_injection_eligible_at - at;
            assert!((2_000..5_000).contains(&cooldown));
        }
        for pair in bursts.windows(2) {
            assert!(pair[1].0 > pair[0].1.next_injection_eligible_at);
        }
    }

    #[test]
    fn test_linear_decay_between_bursts() {
        let states = run(11, 0.95, 2_000);
        for pair in states.windows(2) {
            if !pair[1].rhythmic_injection {
                let expected = (pair[0].dissonance_level - 0.01).max(0.0);
                assert!((pair[1].dissonance_level - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_seeded_runs_replay() {
        assert_eq!(run(42, 0.9, 500), run(42, 0.9, 500));
    }

    #[test]
    fn test_disabled_stays_silent() {
        let mut scheduler = CreativeFlowScheduler::new(false);
        let mut rng = StdRng::seed_from_u64(1);
        for t in 0..100 {
            let s = scheduler.update(1.0, t * 250, &mut rng);
            assert!(!s.enabled);
            assert_eq!(s.dissonance_level, 0.0);
        }
    }
}
