//! Adam optimizer.

use crate::{Optimizer, OptimizerConfig, OptimizerError};
use serde::{Deserialize, Serialize};

/// Adam optimizer with adaptive learning rates and momentum.
///
/// ```text
/// g = gradient + weight_decay * param
/// m = beta1 * m + (1 - beta1) * g
/// v = beta2 * v + (1 - beta2) * g^2
/// m_hat = m / (1 - beta1^t)
/// v_hat = v / (1 - beta2^t)
/// param = param - learning_rate * m_hat / (sqrt(v_hat) + epsilon)
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    weight_decay: f32,
    m: Vec<f32>,
    v: Vec<f32>,
    t: u64,
    config: OptimizerConfig,
}

impl Optimizer for Adam {
    fn new(config: OptimizerConfig) -> Result<Self, OptimizerError> {
        match config {
            OptimizerConfig::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
                weight_decay,
            } => Ok(Self {
                learning_rate,
                beta1,
                beta2,
                epsilon,
                weight_decay,
                m: Vec::new(),
                v: Vec::new(),
                t: 0,
                config,
            }),
            _ => Err(OptimizerError::ConfigMismatch {
                expected: "Adam".to_string(),
                got: config.name().to_string(),
            }),
        }
    }

    fn apply_gradients(&mut self, params: &mut [f32], gradients: &[f32]) {
        if self.m.len() != params.len() {
            self.m = vec![0.0; params.len()];
            self.v = vec![0.0; params.len()];
        }
        self.t += 1;
        let bias_correction1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias_correction2 = 1.0 - self.beta2.powi(self.t as i32);

        for (i, (p, g)) in params.iter_mut().zip(gradients.iter()).enumerate() {
            let grad = *g + self.weight_decay * *p;
            self.m[i] = self.beta1 * self.m[i] + (1.0 - self.beta1) * grad;
            self.v[i] = self.beta2 * self.v[i] + (1.0 - self.beta2) * grad * grad;
            let m_hat = self.m[i] / bias_correction1;
            let v_hat = self.v[i] / bias_correction2;
            *p -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
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

    fn config(lr: f32) -> OptimizerConfig {
        OptimizerConfig::Adam {
            learning_rate: lr,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            weight_decay: 0.0,
        }
    }

    #[test]
    fn test_adam_first_step_is_learning_rate() {
        let mut adam = Adam::new(config(0.01)).unwrap();
        let mut params = vec![1.0, -1.0];
        adam.apply_gradients(&mut params, &[3.0, -0.5]);
        // bias-corrected first step moves each coordinate by ~lr * sign(g)
        assert!((params[0] - 0.99).abs() < 1e-4);
        assert!((params[1] + 0.99).abs() < 1e-4);
    }

    #[test]
    fn test_adam_converges_on_quadratic() {
        let mut adam = Adam::new(config(0.1)).unwrap();
        let mut x = vec![5.0];
        for _ in 0..500 {
            let g = vec![2.0 * x[0]];
            adam.apply_gradients(&mut x, &g);
        }
        assert!(x[0].abs() < 0.1);
    }
}
