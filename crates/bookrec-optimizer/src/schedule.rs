//! Learning-rate schedules.

use serde::{Deserialize, Serialize};

/// Multiplies the learning rate by `gamma` every `step_size` epochs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepLr {
    pub step_size: u64,
    pub gamma: f32,
}

impl StepLr {
    pub fn new(step_size: u64, gamma: f32) -> Self {
        Self {
            step_size: step_size.max(1),
            gamma,
        }
    }

    /// Learning rate to use after `epochs_done` completed epochs.
    pub fn learning_rate(&self, base_lr: f32, epochs_done: u64) -> f32 {
        base_lr * self.gamma.powi((epochs_done / self.step_size) as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_decay() {
        let s = StepLr::new(2, 0.5);
        assert_eq!(s.learning_rate(1.0, 0), 1.0);
        assert_eq!(s.learning_rate(1.0, 1), 1.0);
        assert_eq!(s.learning_rate(1.0, 2), 0.5);
        assert_eq!(s.learning_rate(1.0, 5), 0.25);
    }

    #[test]
    fn test_zero_step_size_is_clamped() {
        let s = StepLr::new(0, 0.1);
        assert_eq!(s.step_size, 1);
    }
}
