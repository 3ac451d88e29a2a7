//! AMSGrad, the default optimizer for every neural rating model.
//!
//! Each parameter tensor (an embedding table, a dense kernel, a bias) gets
//! its own instance. Sparse embedding rows see long runs of zero gradient
//! between the batches that touch them, and keeping the peak second moment
//! stops their step size from growing back during those runs.
//!
//! ```
//! use bookrec_optimizer::{Amsgrad, Optimizer, OptimizerConfig};
//!
//! let mut table = vec![0.5, -0.5, 0.0, 0.0];
//! let mut opt = Amsgrad::new(OptimizerConfig::amsgrad(1e-3, 1e-5)).unwrap();
//! // only the first embedding row was looked up this batch
//! opt.apply_gradients(&mut table, &[0.2, -0.1, 0.0, 0.0]);
//! assert!(table[0] < 0.5 && table[1] > -0.5);
//! assert_eq!(&table[2..], &[0.0, 0.0]);
//! ```

use crate::{Optimizer, OptimizerConfig, OptimizerError};
use serde::{Deserialize, Serialize};

/// Running statistics for one scalar parameter.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct Moments {
    mean: f32,
    variance: f32,
    peak_variance: f32,
}

/// Adam whose denominator uses the largest second moment seen so far.
///
/// ```text
/// g     = grad + weight_decay * p
/// m     = beta1 * m + (1 - beta1) * g
/// v     = beta2 * v + (1 - beta2) * g^2
/// v_max = max(v_max, v)
/// p    -= lr / (1 - beta1^t) * m / (sqrt(v_max / (1 - beta2^t)) + epsilon)
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Amsgrad {
    config: OptimizerConfig,
    /// Current rate; starts at the configured one and follows the schedule.
    learning_rate: f32,
    moments: Vec<Moments>,
    steps: u64,
}

impl Amsgrad {
    /// Number of updates applied so far.
    pub fn timestep(&self) -> u64 {
        self.steps
    }

    /// Largest second moment recorded for parameter `index`.
    pub fn peak_second_moment(&self, index: usize) -> Option<f32> {
        self.moments.get(index).map(|m| m.peak_variance)
    }
}

impl Optimizer for Amsgrad {
    fn new(config: OptimizerConfig) -> Result<Self, OptimizerError> {
        let OptimizerConfig::Amsgrad { learning_rate, .. } = config else {
            return Err(OptimizerError::ConfigMismatch {
                expected: "Amsgrad".to_string(),
                got: config.name().to_string(),
            });
        };
        Ok(Self {
            config,
            learning_rate,
            moments: Vec::new(),
            steps: 0,
        })
    }

    fn apply_gradients(&mut self, params: &mut [f32], gradients: &[f32]) {
        let OptimizerConfig::Amsgrad {
            beta1,
            beta2,
            epsilon,
            weight_decay,
            ..
        } = self.config
        else {
            return;
        };
        if self.moments.len() != params.len() {
            self.moments = vec![Moments::default(); params.len()];
        }
        self.steps += 1;
        let t = self.steps.min(i32::MAX as u64) as i32;
        let step = self.learning_rate / (1.0 - beta1.powi(t));
        let variance_scale = (1.0 - beta2.powi(t)).sqrt();

        for ((p, &g), state) in params.iter_mut().zip(gradients).zip(&mut self.moments) {
            let g = g + weight_decay * *p;
            state.mean = beta1 * state.mean + (1.0 - beta1) * g;
            state.variance = beta2 * state.variance + (1.0 - beta2) * g * g;
            state.peak_variance = state.peak_variance.max(state.variance);
            *p -= step * state.mean / (state.peak_variance.sqrt() / variance_scale + epsilon);
        }
    }

    fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amsgrad(lr: f32, decay: f32) -> Amsgrad {
        Amsgrad::new(OptimizerConfig::amsgrad(lr, decay)).unwrap()
    }

    #[test]
    fn test_rejects_other_configs() {
        assert!(matches!(
            Amsgrad::new(OptimizerConfig::adam(0.1, 0.0)),
            Err(OptimizerError::ConfigMismatch { .. })
        ));
    }

    #[test]
    fn test_first_step_moves_against_gradient() {
        let mut opt = amsgrad(0.1, 0.0);
        let mut params = vec![1.0, 2.0, -3.0];
        opt.apply_gradients(&mut params, &[1.0, 1.0, -1.0]);
        // bias correction makes the first step exactly lr per coordinate
        for (p, want) in params.iter().zip([0.9, 1.9, -2.9]) {
            assert!((p - want).abs() < 1e-4, "{p} != {want}");
        }
        assert_eq!(opt.timestep(), 1);
    }

    #[test]
    fn test_peak_survives_quiet_batches() {
        let mut opt = amsgrad(0.1, 0.0);
        let mut row = vec![0.0];
        opt.apply_gradients(&mut row, &[10.0]);
        let peak = opt.peak_second_moment(0).unwrap();
        for _ in 0..5 {
            opt.apply_gradients(&mut row, &[0.1]);
        }
        assert_eq!(opt.peak_second_moment(0), Some(peak));
        assert_eq!(opt.peak_second_moment(1), None);
        assert_eq!(opt.timestep(), 6);
    }

    #[test]
    fn test_weight_decay_shrinks_untouched_rows() {
        let mut opt = amsgrad(0.01, 0.1);
        let mut params = vec![1.0, -1.0];
        opt.apply_gradients(&mut params, &[0.0, 0.0]);
        assert!(params[0] < 1.0 && params[1] > -1.0);
    }

    #[test]
    fn test_schedule_overrides_rate() {
        let mut opt = amsgrad(0.1, 0.0);
        opt.set_learning_rate(0.01);
        assert_eq!(opt.learning_rate(), 0.01);
        assert_eq!(opt.config().learning_rate(), 0.1);
        let mut params = vec![1.0];
        opt.apply_gradients(&mut params, &[1.0]);
        assert!((params[0] - 0.99).abs() < 1e-4);
    }
}
