//! Fixed-timestep accumulator
//!
//! Turns variable wall-clock frame deltas into a whole number of `SIM_DT`
//! steps. Time beyond the per-frame step cap is dropped, never replayed.

use crate::consts::{MAX_FRAME_DT, SIM_DT};

#[derive(Debug, Clone, Default)]
pub struct FixedStep {
    accumulator: f32,
}

impl FixedStep {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a frame delta (seconds) and get the number of steps to run now.
    pub fn advance(&mut self, frame_dt: f32, max_steps: u32) -> u32 {
        if frame_dt.is_finite() && frame_dt > 0.0 {
            self.accumulator += frame_dt.min(MAX_FRAME_DT);
        }

        let mut steps = 0;
        while self.accumulator >= SIM_DT && steps < max_steps {
            self.accumulator -= SIM_DT;
            steps += 1;
        }

        // Backlog past the cap (tab was hidden, debugger paused...) is discarded
        if self.accumulator >= SIM_DT {
            log::debug!("Dropping {:.3}s of simulation backlog", self.accumulator);
            self.accumulator %= SIM_DT;
        }
        steps
    }

    /// Leftover time as a fraction of one step (for render interpolation)
    pub fn alpha(&self) -> f32 {
        (self.accumulator / SIM_DT).clamp(0.0, 1.0)
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::MAX_SUBSTEPS;

    #[test]
    fn test_accumulates_partial_steps() {
        let mut clock = FixedStep::new();
        assert_eq!(clock.advance(SIM_DT * 0.6, MAX_SUBSTEPS), 0);
        assert_eq!(clock.advance(SIM_DT * 0.6, MAX_SUBSTEPS), 1);
        assert!(clock.alpha() > 0.1 && clock.alpha() < 0.3);
    }

    #[test]
    fn test_caps_and_drops_backlog() {
        let mut clock = FixedStep::new();
        // Huge gap is clamped to MAX_FRAME_DT (12 steps) then capped at 8
        assert_eq!(clock.advance(5.0, MAX_SUBSTEPS), MAX_SUBSTEPS);
        assert!(clock.alpha() < 1.0);
        // The excess is gone, not replayed next frame
        assert_eq!(clock.advance(0.0, MAX_SUBSTEPS), 0);
    }

    #[test]
    fn test_ignores_bad_deltas() {
        let mut clock = FixedStep::new();
        assert_eq!(clock.advance(f32::NAN, MAX_SUBSTEPS), 0);
        assert_eq!(clock.advance(-1.0, MAX_SUBSTEPS), 0);
    }
}
