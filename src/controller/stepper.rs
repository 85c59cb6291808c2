/// Turns variable frame time into a whole number of fixed physics steps
#[derive(Debug, Clone)]
pub struct FixedStepper {
    step: f32,
    max_substeps: u32,
    max_frame_time: f32,
    accumulator: f32,
}

impl FixedStepper {
    pub fn new(step: f32, max_substeps: u32, max_frame_time: f32) -> Self {
        Self {
            step,
            max_substeps: max_substeps.max(1),
            max_frame_time,
            accumulator: 0.0,
        }
    }

    pub fn step(&self) -> f32 {
        self.step
    }

    pub fn accumulated(&self) -> f32 {
        self.accumulator
    }

    /// Feed one frame's delta and return how many steps to run now.
    /// Backlog beyond `max_substeps` is dropped.
    pub fn advance(&mut self, dt: f32) -> u32 {
        if !dt.is_finite() || self.step <= 0.0 {
            return 0;
        }
        self.accumulator += dt.clamp(0.0, self.max_frame_time);
        let due = (self.accumulator / self.step).floor() as u32;
        let steps = due.min(self.max_substeps);
        if due > self.max_substeps {
            tracing::debug!(due, "physics falling behind, dropping backlog");
            self.accumulator = 0.0;
        } else {
            self.accumulator -= steps as f32 * self.step;
        }
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEP: f32 = 1.0 / 60.0;

    #[test]
    fn steps_follow_accumulated_time() {
        let mut stepper = FixedStepper::new(STEP, 5, 0.1);
        assert_eq!(stepper.advance(STEP * 0.5), 0);
        assert_eq!(stepper.advance(STEP * 0.6), 1);
        assert!(stepper.accumulated() < STEP);
        assert_eq!(stepper.advance(STEP * 2.0), 2);
    }

    #[test]
    fn long_frames_are_capped() {
        let mut stepper = FixedStepper::new(STEP, 3, 0.1);
        assert_eq!(stepper.advance(3.0), 3);
        assert_eq!(stepper.accumulated(), 0.0);
        assert_eq!(stepper.advance(0.0), 0);
    }

    #[test]
    fn bad_deltas_run_nothing() {
        let mut stepper = FixedStepper::new(STEP, 5, 0.1);
        assert_eq!(stepper.advance(-1.0), 0);
        assert_eq!(stepper.advance(f32::NAN), 0);
        assert_eq!(stepper.accumulated(), 0.0);
    }
}
