//! IntuitiveForesightDetector: golden-angle spiral on convergence

use crate::types::{IntuitiveForesightState, ResonanceNode, SpiralNode};
use crate::{FORESIGHT_ALIGNMENT_GATE, FORESIGHT_DECAY_PER_TICK, FORESIGHT_SPIRAL_STEP, GOLDEN_ANGLE};

#[derive(Debug, Clone)]
pub struct IntuitiveForesightDetector {
    state: IntuitiveForesightState,
}

impl IntuitiveForesightDetector {
    pub fn new(enabled: bool) -> Self {
        Self {
            state: IntuitiveForesightState {
                enabled,
                ..IntuitiveForesightState::default()
            },
        }
    }

    /// Convergence = alignment > 0.6 AND harmonic convergence.
    ///
    /// On convergence the spiral is rebuilt from this tick's nodes and
    /// intensity jumps to the alignment; otherwise intensity decays and the
    /// last spiral is kept.
    pub fn update(
        &mut self,
        golden_ratio_alignment: f64,
        harmonic_convergence: bool,
        nodes: &[ResonanceNode],
    ) -> &IntuitiveForesightState {
        let s = &mut self.state;
        if !s.enabled {
            return s;
        }

        let converged = golden_ratio_alignment > FORESIGHT_ALIGNMENT_GATE && harmonic_convergence;
        if converged {
            s.spiral_nodes = spiral(nodes, golden_ratio_alignment);
            s.spiral_intensity = golden_ratio_alignment.clamp(0.0, 1.0);
        } else {
            s.spiral_intensity = (s.spiral_intensity - FORESIGHT_DECAY_PER_TICK).max(0.0);
        }
        s.convergence_detected = converged;
        s
    }

    pub fn state(&self) -> &IntuitiveForesightState {
        &self.state
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.state.enabled);
    }
}

/// Node i at angle i·golden angle, radius i·15
pub fn spiral(nodes: &[ResonanceNode], alignment: f64) -> Vec<SpiralNode> {
    nodes
        .iter()
        .enumerate()
        .map(|(i, node)| {
            let angle = i as f64 * GOLDEN_ANGLE;
            let radius = i as f64 * FORESIGHT_SPIRAL_STEP;
            SpiralNode {
                x: angle.cos() * radius,
                y: angle.sin() * radius,
                intensity: node.amplitude * alignment,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(amplitude: f64) -> ResonanceNode {
        ResonanceNode {
            id: "n".into(),
            frequency: 100.0,
            amplitude,
            phase: 0.0,
            stability_score: amplitude,
            x: 0.0,
            y: 0.0,
            timestamp: 0,
            harmonic_index: 1,
            resonance_depth: 0.0,
        }
    }

    #[test]
    fn test_convergence_lays_out_spiral() {
        let mut detector = IntuitiveForesightDetector::new(true);
        let nodes = vec![node(0.5), node(0.4), node(0.2)];
        let state = detector.update(0.9, true, &nodes);

        assert!(state.convergence_detected);
        assert_eq!(state.spiral_intensity, 0.9);
        assert_eq!(state.spiral_nodes.len(), 3);
        assert_eq!(state.spiral_nodes[0].x, 0.0);
        let second = state.spiral_nodes[1];
        assert!(((second.x.powi(2) + second.y.powi(2)).sqrt() - 15.0).abs() < 1e-9);
        assert!((second.intensity - 0.36).abs() < 1e-12);
    }

    #[test]
    fn test_both_conditions_required() {
        let mut detector = IntuitiveForesightDetector::new(true);
        assert!(!detector.update(0.6, true, &[node(1.0)]).convergence_detected);
        assert!(!detector.update(0.9, false, &[node(1.0)]).convergence_detected);
    }

    #[test]
    fn test_intensity_decays_to_zero() {
        let mut detector = IntuitiveForesightDetector::new(true);
        detector.update(0.7, true, &[node(1.0)]);
        for _ in 0..10 {
            detector.update(0.0, false, &[]);
        }
        assert!((detector.state().spiral_intensity - 0.5).abs() < 1e-9);
        for _ in 0..100 {
            detector.update(0.0, false, &[]);
        }
        assert_eq!(detector.state().spiral_intensity, 0.0);
        // last spiral is kept for rendering
        assert_eq!(detector.state().spiral_nodes.len(), 1);
    }

    #[test]
    fn test_disabled_detector_is_inert() {
        let mut detector = IntuitiveForesightDetector::new(false);
        let state = detector.update(0.9, true, &[node(1.0)]);
        assert!(!state.convergence_detected);
        assert!(state.spiral_nodes.is_empty());
    }
}
