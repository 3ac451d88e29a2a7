//! Stochastic Gradient Descent (SGD) optimizer.

use crate::{Optimizer, OptimizerConfig, OptimizerError};
use serde::{Deserialize, Serialize};

/// Stochastic Gradient Descent optimizer.
///
/// Updates parameters using the formula:
/// `param = param - learning_rate * (gradient + weight_decay * param)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sgd {
    /// Learning rate for gradient updates.
    learning_rate: f32,
    /// Weight decay (L2 regularization) coefficient.
    weight_decay: f32,
    /// Configuration used to create this optimizer.
    config: OptimizerConfig,
}

impl Sgd {
    /// Creates a new SGD optimizer with the given learning rate.
    pub fn with_learning_rate(learning_rate: f32) -> Self {
        let config = OptimizerConfig::Sgd {
            learning_rate,
            weight_decay: 0.0,
        };
        Self {
            learning_rate,
            weight_decay: 0.0,
            config,
        }
    }
}

impl Optimizer for Sgd {
    fn new(config: OptimizerConfig) -> Result<Self, OptimizerError> {
        match config {
            OptimizerConfig::Sgd {
                learning_rate,
                weight_decay,
            } => Ok(Self {
                learning_rate,
                weight_decay,
                config,
            }),
            _ => Err(OptimizerError::ConfigMismatch {
                expected: "Sgd".to_string(),
                got: config.name().to_string(),
            }),
        }
    }

    fn apply_gradients(&mut self, params: &mut [f32], gradients: &[f32]) {
        for (p, g) in params.iter_mut().zip(gradients.iter()) {
            let grad = *g + self.weight_decay * *p;
            *p -= self.learning_rate * grad;
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

    #[test]
    fn test_sgd_basic_update() {
        let mut sgd = Sgd::with_learning_rate(0.1);
        let mut params = vec![1.0, 2.0, 3.0];
        sgd.apply_gradients(&mut params, &[1.0, 1.0, 1.0]);
        assert!((params[0] - 0.9).abs() < 1e-6);
        assert!((params[1] - 1.9).abs() < 1e-6);
        assert!((params[2] - 2.9).abs() < 1e-6);
    }

    #[test]
    fn test_sgd_weight_decay() {
        let config = OptimizerConfig::Sgd {
            learning_rate: 0.1,
            weight_decay: 0.5,
        };
        let mut sgd = Sgd::new(config).unwrap();
        let mut params = vec![2.0];
        sgd.apply_gradients(&mut params, &[0.0]);
        assert!((params[0] - 1.9).abs() < 1e-6);
    }

    #[test]
    fn test_sgd_wrong_config() {
        assert!(Sgd::new(OptimizerConfig::amsgrad(0.1, 0.0)).is_err());
    }
}
