//! The uniform contract every model family is driven through.
//!
//! An adapter is built for exactly one fold and moves through
//!
//! ```text
//! Constructed -> Training -> EarlyStopped | Exhausted -> Ready
//! ```
//!
//! `train` is accepted only in `Constructed`, `predict` only in `Ready`.

use crate::error::{Result, TrainingError};
use bookrec_data::{DataLoader, FoldData, TargetTransform};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Constructed,
    Training,
    /// Patience ran out before the epoch budget.
    EarlyStopped,
    /// Every epoch ran.
    Exhausted,
    /// Best checkpoint restored; predictions allowed.
    Ready,
}

impl AdapterState {
    pub fn as_str(self) -> &'static str {
        match self {
            AdapterState::Constructed => "constructed",
            AdapterState::Training => "training",
            AdapterState::EarlyStopped => "early-stopped",
            AdapterState::Exhausted => "exhausted",
            AdapterState::Ready => "ready",
        }
    }

    /// Errors unless the adapter is in `expected`.
    pub fn require(self, expected: AdapterState) -> Result<()> {
        if self == expected {
            Ok(())
        } else {
            Err(TrainingError::InvalidState {
                expected: expected.as_str(),
                actual: self.as_str(),
            })
        }
    }
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Train/validate/predict contract shared by neural and boosted models.
pub trait ModelAdapter: Send {
    fn name(&self) -> &str;

    fn state(&self) -> AdapterState;

    /// Trains on the adapter's fold and returns the validation RMSE of
    /// the restored best model on the original rating scale. `fold`
    /// selects the checkpoint namespace.
    fn train(&mut self, fold: usize) -> Result<f64>;

    /// Inference in loader storage order. Regression adapters return
    /// model-space outputs; classifiers return arg-max class indices.
    fn predict(&mut self, loader: &DataLoader) -> Result<Vec<f32>>;
}

/// The training half of a fold: what an adapter owns.
#[derive(Debug, Clone)]
pub struct FoldInputs {
    pub fold: usize,
    pub train: DataLoader,
    pub valid: DataLoader,
    pub transform: TargetTransform,
    /// Validation ratings on the original scale, in `valid` storage order.
    pub valid_ratings: Vec<f32>,
}

impl FoldInputs {
    /// Separates a fold's training inputs from its test loader.
    pub fn from_fold(data: FoldData) -> (Self, DataLoader) {
        let FoldData {
            fold,
            train,
            valid,
            test,
            transform,
            valid_ratings,
        } = data;
        (
            Self {
                fold,
                train,
                valid,
                transform,
                valid_ratings,
            },
            test,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_state() {
        assert!(AdapterState::Ready.require(AdapterState::Ready).is_ok());
        let err = AdapterState::Constructed
            .require(AdapterState::Ready)
            .unwrap_err();
        assert!(matches!(
            err,
            TrainingError::InvalidState {
                expected: "ready",
                actual: "constructed"
            }
        ));
        assert_eq!(AdapterState::EarlyStopped.to_string(), "early-stopped");
    }
}
