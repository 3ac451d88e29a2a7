//! Parameter optimizers for the book rating models.
//!
//! Each optimizer updates one flat parameter buffer from its gradient and
//! keeps its own moment state, so a model holds one optimizer per
//! parameter tensor.
//!
//! # Available Optimizers
//!
//! - [`Sgd`] - Stochastic Gradient Descent with optional L2 weight decay
//! - [`Adam`] - Adaptive Moment Estimation
//! - [`Amsgrad`] - AMSGrad (Adam variant, the training default)
//!
//! # Example
//!
//! ```
//! use bookrec_optimizer::{Optimizer, Sgd, OptimizerConfig};
//!
//! let config = OptimizerConfig::Sgd { learning_rate: 0.01, weight_decay: 0.0 };
//! let mut optimizer = Sgd::new(config).unwrap();
//!
//! let mut params = vec![1.0, 2.0, 3.0];
//! let gradients = vec![0.1, 0.2, 0.3];
//!
//! optimizer.apply_gradients(&mut params, &gradients);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod adam;
mod amsgrad;
mod schedule;
mod sgd;

pub use adam::Adam;
pub use amsgrad::Amsgrad;
pub use schedule::StepLr;
pub use sgd::Sgd;

/// Errors that can occur when working with optimizers.
#[derive(Debug, Error)]
pub enum OptimizerError {
    /// Configuration type does not match the optimizer type.
    #[error("Config mismatch: expected {expected}, got {got}")]
    ConfigMismatch { expected: String, got: String },

    /// Invalid configuration parameter.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Configuration for different optimizer types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OptimizerConfig {
    /// Stochastic Gradient Descent configuration.
    Sgd {
        /// Learning rate for gradient updates.
        learning_rate: f32,
        /// Weight decay (L2 regularization) coefficient.
        weight_decay: f32,
    },

    /// Adam configuration.
    Adam {
        /// Learning rate for gradient updates.
        learning_rate: f32,
        /// Exponential decay rate for first moment estimates.
        beta1: f32,
        /// Exponential decay rate for second moment estimates.
        beta2: f32,
        /// Small constant for numerical stability.
        epsilon: f32,
        /// Weight decay (L2 regularization) coefficient.
        weight_decay: f32,
    },

    /// AMSGrad configuration.
    Amsgrad {
        /// Learning rate for gradient updates.
        learning_rate: f32,
        /// Exponential decay rate for first moment estimates.
        beta1: f32,
        /// Exponential decay rate for second moment estimates.
        beta2: f32,
        /// Small constant for numerical stability.
        epsilon: f32,
        /// Weight decay (L2 regularization) coefficient.
        weight_decay: f32,
    },
}

impl OptimizerConfig {
    pub fn adam(learning_rate: f32, weight_decay: f32) -> Self {
        OptimizerConfig::Adam {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            weight_decay,
        }
    }

    /// AMSGrad with the usual Adam betas and epsilon.
    pub fn amsgrad(learning_rate: f32, weight_decay: f32) -> Self {
        OptimizerConfig::Amsgrad {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            weight_decay,
        }
    }

    /// Returns the name of the optimizer type.
    pub fn name(&self) -> &'static str {
        match self {
            OptimizerConfig::Sgd { .. } => "Sgd",
            OptimizerConfig::Adam { .. } => "Adam",
            OptimizerConfig::Amsgrad { .. } => "Amsgrad",
        }
    }

    /// Returns the learning rate for the optimizer.
    pub fn learning_rate(&self) -> f32 {
        match self {
            OptimizerConfig::Sgd { learning_rate, .. } => *learning_rate,
            OptimizerConfig::Adam { learning_rate, .. } => *learning_rate,
            OptimizerConfig::Amsgrad { learning_rate, .. } => *learning_rate,
        }
    }

    /// Checks the numeric ranges of every field.
    pub fn validate(&self) -> Result<(), OptimizerError> {
        let lr = self.learning_rate();
        if !(lr.is_finite() && lr > 0.0) {
            return Err(OptimizerError::InvalidParameter(format!(
                "learning_rate must be positive, got {lr}"
            )));
        }
        match self {
            OptimizerConfig::Sgd { weight_decay, .. } => check_decay(*weight_decay),
            OptimizerConfig::Adam {
                beta1,
                beta2,
                weight_decay,
                ..
            }
            | OptimizerConfig::Amsgrad {
                beta1,
                beta2,
                weight_decay,
                ..
            } => {
                for (name, beta) in [("beta1", beta1), ("beta2", beta2)] {
                    if !(0.0..1.0).contains(beta) {
                        return Err(OptimizerError::InvalidParameter(format!(
                            "{name} must be in [0, 1), got {beta}"
                        )));
                    }
                }
                check_decay(*weight_decay)
            }
        }
    }
}

fn check_decay(weight_decay: f32) -> Result<(), OptimizerError> {
    if weight_decay < 0.0 {
        return Err(OptimizerError::InvalidParameter(format!(
            "weight_decay must be non-negative, got {weight_decay}"
        )));
    }
    Ok(())
}

/// Trait for parameter optimizers.
pub trait Optimizer: Sized {
    /// Creates a new optimizer from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizerError::ConfigMismatch`] if the configuration type
    /// does not match the optimizer type.
    fn new(config: OptimizerConfig) -> Result<Self, OptimizerError>;

    /// Applies gradients to update the parameter buffer in place.
    ///
    /// # Panics
    ///
    /// May panic if `params` and `gradients` have different lengths.
    fn apply_gradients(&mut self, params: &mut [f32], gradients: &[f32]);

    /// Returns a reference to the optimizer's configuration.
    fn config(&self) -> &OptimizerConfig;

    /// Current learning rate.
    fn learning_rate(&self) -> f32;

    /// Overrides the learning rate, used by schedules.
    fn set_learning_rate(&mut self, learning_rate: f32);
}

/// Creates a boxed optimizer from the given configuration.
///
/// # Example
///
/// ```
/// use bookrec_optimizer::{create_optimizer, OptimizerConfig};
///
/// let optimizer = create_optimizer(OptimizerConfig::amsgrad(1e-4, 1e-5)).unwrap();
/// assert_eq!(optimizer.config().name(), "Amsgrad");
/// ```
pub fn create_optimizer(config: OptimizerConfig) -> Result<Box<dyn OptimizerDyn>, OptimizerError> {
    config.validate()?;
    Ok(match &config {
        OptimizerConfig::Sgd { .. } => Box::new(Sgd::new(config)?),
        OptimizerConfig::Adam { .. } => Box::new(Adam::new(config)?),
        OptimizerConfig::Amsgrad { .. } => Box::new(Amsgrad::new(config)?),
    })
}

/// Dynamic dispatch version of the Optimizer trait.
pub trait OptimizerDyn: Send {
    /// Applies gradients to update the parameter buffer.
    fn apply_gradients(&mut self, params: &mut [f32], gradients: &[f32]);

    /// Returns a reference to the optimizer's configuration.
    fn config(&self) -> &OptimizerConfig;

    /// Current learning rate.
    fn learning_rate(&self) -> f32;

    /// Overrides the learning rate.
    fn set_learning_rate(&mut self, learning_rate: f32);
}

impl<T: Optimizer + Send> OptimizerDyn for T {
    fn apply_gradients(&mut self, params: &mut [f32], gradients: &[f32]) {
        Optimizer::apply_gradients(self, params, gradients)
    }

    fn config(&self) -> &OptimizerConfig {
        Optimizer::config(self)
    }

    fn learning_rate(&self) -> f32 {
        Optimizer::learning_rate(self)
    }

    fn set_learning_rate(&mut self, learning_rate: f32) {
        Optimizer::set_learning_rate(self, learning_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimizer_config_name() {
        let sgd = OptimizerConfig::Sgd {
            learning_rate: 0.01,
            weight_decay: 0.0,
        };
        assert_eq!(sgd.name(), "Sgd");
        assert_eq!(OptimizerConfig::amsgrad(1e-3, 0.0).name(), "Amsgrad");
    }

    #[test]
    fn test_optimizer_config_learning_rate() {
        let cfg = OptimizerConfig::amsgrad(1e-4, 1e-5);
        assert!((cfg.learning_rate() - 1e-4).abs() < 1e-9);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(OptimizerConfig::amsgrad(0.0, 0.0).validate().is_err());
        assert!(OptimizerConfig::amsgrad(1e-3, -1.0).validate().is_err());
        let bad_beta = OptimizerConfig::Adam {
            learning_rate: 1e-3,
            beta1: 1.0,
            beta2: 0.999,
            epsilon: 1e-8,
            weight_decay: 0.0,
        };
        assert!(bad_beta.validate().is_err());
        assert!(create_optimizer(OptimizerConfig::amsgrad(-1.0, 0.0)).is_err());
    }

    #[test]
    fn test_create_optimizer_dispatch() {
        let mut opt = create_optimizer(OptimizerConfig::Sgd {
            learning_rate: 0.5,
            weight_decay: 0.0,
        })
        .unwrap();
        let mut p = vec![1.0];
        opt.apply_gradients(&mut p, &[1.0]);
        assert!((p[0] - 0.5).abs() < 1e-6);
        opt.set_learning_rate(0.1);
        assert!((opt.learning_rate() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let cfg = OptimizerConfig::amsgrad(1e-4, 1e-5);
        let json = serde_json::to_string(&cfg).unwrap();
        let back: OptimizerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
