//! Training losses. Each returns the batch loss and the gradient with
//! respect to the model output.

use crate::error::{Result, TrainingError};
use bookrec_data::Targets;
use bookrec_layers::Tensor;
use serde::{Deserialize, Serialize};

const RMSE_EPS: f32 = 1e-6;

/// Regression loss selected in the run configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LossKind {
    #[default]
    Rmse,
    #[serde(rename = "sl1")]
    SmoothL1,
    Huber,
}

impl std::str::FromStr for LossKind {
    type Err = TrainingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rmse" => Ok(LossKind::Rmse),
            "sl1" | "smooth_l1" => Ok(LossKind::SmoothL1),
            "huber" => Ok(LossKind::Huber),
            other => Err(TrainingError::Config(format!("unknown loss '{other}'"))),
        }
    }
}

/// A bound loss function.
#[derive(Debug, Clone, PartialEq)]
pub enum Loss {
    /// `sqrt(mean((y - t)^2) + eps)`.
    Rmse,
    /// Quadratic below `beta`, linear above, scaled by `1 / beta`.
    SmoothL1 { beta: f32 },
    /// Quadratic below `delta`, linear above.
    Huber { delta: f32 },
    /// Softmax cross entropy, weighted per true class and normalized by
    /// the summed weights.
    CrossEntropy { weights: Vec<f32> },
}

impl Loss {
    pub fn regression(kind: LossKind, beta: f32) -> Self {
        match kind {
            LossKind::Rmse => Loss::Rmse,
            LossKind::SmoothL1 => Loss::SmoothL1 { beta },
            LossKind::Huber => Loss::Huber { delta: beta },
        }
    }

    /// Loss value and `d loss / d output` for one batch.
    pub fn compute(&self, output: &Tensor, targets: &Targets) -> Result<(f32, Tensor)> {
        match (self, targets) {
            (Loss::CrossEntropy { weights }, Targets::Classes(classes)) => {
                Ok(cross_entropy(output, classes, weights))
            }
            (Loss::CrossEntropy { .. }, Targets::Regression(_)) => Err(TrainingError::Config(
                "cross entropy needs class targets".to_string(),
            )),
            (_, Targets::Classes(_)) => Err(TrainingError::Config(
                "regression loss needs continuous targets".to_string(),
            )),
            (loss, Targets::Regression(t)) => Ok(loss.regression_loss(output, t)),
        }
    }

    fn regression_loss(&self, output: &Tensor, targets: &[f32]) -> (f32, Tensor) {
        let n = targets.len().max(1) as f32;
        let diffs: Vec<f32> = output
            .data()
            .iter()
            .zip(targets)
            .map(|(y, t)| y - t)
            .collect();
        let (loss, grad): (f32, Vec<f32>) = match *self {
            Loss::Rmse => {
                let mse = diffs.iter().map(|d| d * d).sum::<f32>() / n;
                let loss = (mse + RMSE_EPS).sqrt();
                (loss, diffs.iter().map(|d| d / (n * loss)).collect())
            }
            Loss::SmoothL1 { beta } => {
                let mut total = 0.0;
                let grad = diffs
                    .iter()
                    .map(|&d| {
                        if d.abs() < beta {
                            total += 0.5 * d * d / beta;
                            d / beta / n
                        } else {
                            total += d.abs() - 0.5 * beta;
                            d.signum() / n
                        }
                    })
                    .collect();
                (total / n, grad)
            }
            Loss::Huber { delta } => {
                let mut total = 0.0;
                let grad = diffs
                    .iter()
                    .map(|&d| {
                        if d.abs() <= delta {
                            total += 0.5 * d * d;
                            d / n
                        } else {
                            total += delta * (d.abs() - 0.5 * delta);
                            delta * d.signum() / n
                        }
                    })
                    .collect();
                (total / n, grad)
            }
            Loss::CrossEntropy { .. } => (0.0, vec![0.0; diffs.len()]),
        };
        (loss, Tensor::from_data(output.shape(), grad))
    }
}

fn cross_entropy(output: &Tensor, classes: &[usize], weights: &[f32]) -> (f32, Tensor) {
    let probs = output.softmax_rows();
    let c = output.cols();
    let weight = |class: usize| weights.get(class).copied().unwrap_or(1.0);
    let total_weight: f32 = classes.iter().map(|&y| weight(y)).sum::<f32>().max(f32::MIN_POSITIVE);
    let mut loss = 0.0;
    let mut grad = probs.data().to_vec();
    for (b, &y) in classes.iter().enumerate() {
        let w = weight(y);
        loss -= w * probs.data()[b * c + y].max(1e-12).ln();
        grad[b * c + y] -= 1.0;
        for g in &mut grad[b * c..(b + 1) * c] {
            *g *= w / total_weight;
        }
    }
    (loss / total_weight, Tensor::from_data(output.shape(), grad))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(v: &[f32]) -> Tensor {
        Tensor::from_data(&[v.len(), 1], v.to_vec())
    }

    #[test]
    fn test_rmse_loss_and_grad() {
        let (loss, grad) = Loss::Rmse
            .compute(&column(&[3.0, 1.0]), &Targets::Regression(vec![0.0, 1.0]))
            .unwrap();
        let expected = (4.5f32 + RMSE_EPS).sqrt();
        assert!((loss - expected).abs() < 1e-5);
        assert!((grad.data()[0] - 3.0 / (2.0 * expected)).abs() < 1e-5);
        assert_eq!(grad.data()[1], 0.0);
    }

    #[test]
    fn test_smooth_l1_regions() {
        let loss = Loss::SmoothL1 { beta: 1.0 };
        let (l, g) = loss
            .compute(&column(&[0.5, 3.0]), &Targets::Regression(vec![0.0, 0.0]))
            .unwrap();
        assert!((l - (0.125 + 2.5) / 2.0).abs() < 1e-6);
        assert_eq!(g.data(), &[0.25, 0.5]);
    }

    #[test]
    fn test_huber_linear_region() {
        let (l, g) = Loss::Huber { delta: 1.0 }
            .compute(&column(&[-4.0]), &Targets::Regression(vec![0.0]))
            .unwrap();
        assert!((l - 3.5).abs() < 1e-6);
        assert_eq!(g.data(), &[-1.0]);
    }

    #[test]
    fn test_weighted_cross_entropy() {
        let logits = Tensor::from_data(&[2, 2], vec![0.0, 0.0, 0.0, 0.0]);
        let loss = Loss::CrossEntropy {
            weights: vec![1.0, 3.0],
        };
        let (l, g) = loss.compute(&logits, &Targets::Classes(vec![0, 1])).unwrap();
        assert!((l - std::f32::consts::LN_2).abs() < 1e-6);
        // row 0 weight 1/4, row 1 weight 3/4
        assert!((g.data()[0] + 0.125).abs() < 1e-6);
        assert!((g.data()[3] + 0.375).abs() < 1e-6);
    }

    #[test]
    fn test_target_kind_mismatch() {
        assert!(Loss::Rmse
            .compute(&column(&[1.0]), &Targets::Classes(vec![0]))
            .is_err());
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("sl1".parse::<LossKind>().unwrap(), LossKind::SmoothL1);
        assert!("mae".parse::<LossKind>().is_err());
    }
}
