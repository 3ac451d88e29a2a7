//! Error types for training and orchestration.

use crate::hooks::HookError;
use bookrec_checkpoint::CheckpointError;
use bookrec_data::DataError;
use bookrec_layers::LayerError;
use bookrec_optimizer::OptimizerError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while training, predicting or writing results.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Layer(#[from] LayerError),

    #[error(transparent)]
    Optimizer(#[from] OptimizerError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Hook(#[from] HookError),

    /// The gradient-boosting library rejected a call.
    #[error("booster error: {0}")]
    Booster(String),

    /// Inconsistent run configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An adapter was driven out of order.
    #[error("adapter is {actual}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    /// A fold failed; the run stops with it.
    #[error("fold {fold} failed: {source}")]
    Fold {
        fold: usize,
        #[source]
        source: Box<TrainingError>,
    },

    /// A submission template row does not name the pair that was predicted.
    #[error("submission row {row} is {found}, predictions are for {expected}")]
    Misaligned {
        row: usize,
        expected: String,
        found: String,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error writing {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Result type for training operations.
pub type Result<T> = std::result::Result<T, TrainingError>;
