//! Inverted dropout.

use crate::error::LayerError;
use crate::layer::Layer;
use crate::tensor::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Zeroes each activation with probability `rate` while training and
/// rescales the survivors by `1 / (1 - rate)`. Identity at inference.
#[derive(Debug, Clone)]
pub struct Dropout {
    rate: f32,
    training: bool,
    rng: StdRng,
    mask: Option<Tensor>,
}

impl Dropout {
    pub fn new(rate: f32, seed: u64) -> Result<Self, LayerError> {
        if !(0.0..1.0).contains(&rate) {
            return Err(LayerError::ConfigError {
                message: format!("Dropout rate must be in [0, 1), got {rate}"),
            });
        }
        Ok(Self {
            rate,
            training: true,
            rng: StdRng::seed_from_u64(seed),
            mask: None,
        })
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }
}

impl Layer for Dropout {
    fn forward(&self, input: &Tensor) -> Result<Tensor, LayerError> {
        Ok(input.clone())
    }

    fn forward_train(&mut self, input: &Tensor) -> Result<Tensor, LayerError> {
        if !self.training || self.rate == 0.0 {
            self.mask = Some(Tensor::ones(input.shape()));
            return Ok(input.clone());
        }
        let keep = 1.0 - self.rate;
        let scale = 1.0 / keep;
        let data = (0..input.numel())
            .map(|_| {
                if self.rng.gen::<f32>() < keep {
                    scale
                } else {
                    0.0
                }
            })
            .collect();
        let mask = Tensor::from_data(input.shape(), data);
        let out = input.mul(&mask);
        self.mask = Some(mask);
        Ok(out)
    }

    fn backward(&mut self, grad: &Tensor) -> Result<Tensor, LayerError> {
        let mask = self.mask.as_ref().ok_or(LayerError::NotInitialized)?;
        Ok(grad.mul(mask))
    }

    fn parameters(&self) -> Vec<&Tensor> {
        Vec::new()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        Vec::new()
    }

    fn name(&self) -> &str {
        "Dropout"
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }
}
