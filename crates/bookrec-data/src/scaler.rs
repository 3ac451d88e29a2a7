//! Target scaling for regression models.

use crate::error::{DataError, Result};
use serde::{Deserialize, Serialize};

/// Mean and sample standard deviation of one fold's training targets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: f64,
    std: f64,
}

impl StandardScaler {
    /// Fits on `targets`. Fewer than two values, or a zero or non-finite
    /// standard deviation, is a [`DataError::DegenerateTarget`].
    pub fn fit(targets: &[f32]) -> Result<Self> {
        let n = targets.len();
        if n < 2 {
            return Err(DataError::DegenerateTarget {
                len: n,
                std: f64::NAN,
            });
        }
        let mean = targets.iter().map(|&t| t as f64).sum::<f64>() / n as f64;
        let var = targets
            .iter()
            .map(|&t| (t as f64 - mean).powi(2))
            .sum::<f64>()
            / (n - 1) as f64;
        let std = var.sqrt();
        if !(std.is_finite() && std > 0.0) {
            return Err(DataError::DegenerateTarget { len: n, std });
        }
        Ok(Self { mean, std })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn std(&self) -> f64 {
        self.std
    }

    pub fn normalize(&self, x: f32) -> f32 {
        ((x as f64 - self.mean) / self.std) as f32
    }

    pub fn denormalize(&self, z: f32) -> f32 {
        (z as f64 * self.std + self.mean) as f32
    }
}

/// How regression targets are mapped into model space and back.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum TargetTransform {
    #[default]
    Identity,
    /// Ratings divided by ten.
    ZeroOne,
    Standard(StandardScaler),
}

impl TargetTransform {
    pub fn forward(&self, rating: f32) -> f32 {
        match self {
            TargetTransform::Identity => rating,
            TargetTransform::ZeroOne => rating / 10.0,
            TargetTransform::Standard(s) => s.normalize(rating),
        }
    }

    pub fn inverse(&self, value: f32) -> f32 {
        match self {
            TargetTransform::Identity => value,
            TargetTransform::ZeroOne => value * 10.0,
            TargetTransform::Standard(s) => s.denormalize(value),
        }
    }

    pub fn forward_all(&self, ratings: &[f32]) -> Vec<f32> {
        ratings.iter().map(|&r| self.forward(r)).collect()
    }

    pub fn inverse_all(&self, values: &[f32]) -> Vec<f32> {
        values.iter().map(|&v| self.inverse(v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_uses_sample_std() {
        let s = StandardScaler::fit(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((s.mean() - 5.0).abs() < 1e-12);
        assert!((s.std() - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_round_trip() {
        let s = StandardScaler::fit(&[1.0, 10.0, 7.0, 3.0]).unwrap();
        for x in [-3.5f32, 0.0, 1.0, 6.25, 10.0, 1e4] {
            let back = s.denormalize(s.normalize(x));
            assert!((back - x).abs() <= 1e-3 * x.abs().max(1.0));
        }
    }

    #[test]
    fn test_degenerate_targets() {
        assert!(matches!(
            StandardScaler::fit(&[7.0, 7.0, 7.0]),
            Err(DataError::DegenerateTarget { len: 3, .. })
        ));
        assert!(StandardScaler::fit(&[7.0]).is_err());
        assert!(StandardScaler::fit(&[]).is_err());
        assert!(StandardScaler::fit(&[1.0, f32::INFINITY]).is_err());
    }

    #[test]
    fn test_zero_one() {
        let t = TargetTransform::ZeroOne;
        assert_eq!(t.forward_all(&[10.0, 5.0]), vec![1.0, 0.5]);
        assert_eq!(t.inverse(0.75), 7.5);
        assert_eq!(TargetTransform::default().inverse(3.0), 3.0);
    }
}
