//! Seeded weight initializers.

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::tensor::Tensor;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum Initializer {
    /// Glorot/Xavier uniform initialization.
    #[default]
    GlorotUniform,
    /// Glorot/Xavier normal initialization.
    GlorotNormal,
    /// He/Kaiming uniform initialization.
    HeUniform,
    /// Normal distribution with a fixed standard deviation.
    Normal(f32),
    /// All zeros.
    Zeros,
    /// Constant value.
    Constant(f32),
}

impl Initializer {
    pub fn initialize(&self, shape: &[usize], rng: &mut StdRng) -> Tensor {
        match self {
            Initializer::Zeros => Tensor::zeros(shape),
            Initializer::Constant(value) => {
                Tensor::from_data(shape, vec![*value; shape.iter().product()])
            }
            Initializer::GlorotUniform => {
                let (fan_in, fan_out) = fan_in_out(shape);
                let limit = (6.0 / (fan_in + fan_out) as f32).sqrt();
                Tensor::uniform(shape, -limit, limit, rng)
            }
            Initializer::GlorotNormal => {
                let (fan_in, fan_out) = fan_in_out(shape);
                let std = (2.0 / (fan_in + fan_out) as f32).sqrt();
                Tensor::randn(shape, 0.0, std, rng)
            }
            Initializer::HeUniform => {
                let (fan_in, _) = fan_in_out(shape);
                let limit = (6.0 / fan_in as f32).sqrt();
                Tensor::uniform(shape, -limit, limit, rng)
            }
            Initializer::Normal(std) => Tensor::randn(shape, 0.0, *std, rng),
        }
    }
}

fn fan_in_out(shape: &[usize]) -> (usize, usize) {
    if shape.len() >= 2 {
        (shape[0].max(1), shape[1].max(1))
    } else if shape.len() == 1 {
        let dim = shape[0].max(1);
        (dim, dim)
    } else {
        (1, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_glorot_uniform_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        let t = Initializer::GlorotUniform.initialize(&[10, 6], &mut rng);
        let limit = (6.0f32 / 16.0).sqrt();
        assert!(t.data().iter().all(|x| x.abs() <= limit));
    }

    #[test]
    fn test_constant_and_zeros() {
        let mut rng = StdRng::seed_from_u64(1);
        let t = Initializer::Constant(0.5).initialize(&[3], &mut rng);
        assert_eq!(t.data(), &[0.5, 0.5, 0.5]);
        let z = Initializer::Zeros.initialize(&[2, 2], &mut rng);
        assert_eq!(z.sum(), 0.0);
    }
}
