//! Checkpoint persistence for the book rating models.
//!
//! - [`CheckpointLocation`] derives the per-fold checkpoint path from the
//!   model name and dataset versions.
//! - [`ModelState`] holds named parameter tensors plus training metadata.
//! - [`Checkpointer`] saves and restores a state; [`JsonCheckpointer`] and
//!   [`BinaryCheckpointer`] are the two formats.
//!
//! # Example
//!
//! ```no_run
//! use bookrec_checkpoint::{CheckpointFormat, CheckpointLocation, ModelState};
//!
//! fn main() -> bookrec_checkpoint::Result<()> {
//!     let location = CheckpointLocation::new("/opt/ml/weights", "FM", 1, 1);
//!     let path = location.file(0, CheckpointFormat::Json);
//!     let checkpointer = CheckpointFormat::Json.checkpointer();
//!
//!     let mut state = ModelState::new("FM", 0);
//!     state.add_tensor("linear.weight", vec![3, 1], vec![0.1, 0.2, 0.3]);
//!     checkpointer.save(&path, &state)?;
//!     let restored = checkpointer.restore(&path)?;
//!     assert_eq!(restored.tensors.len(), 1);
//!     Ok(())
//! }
//! ```

pub mod checkpointer;
pub mod path;
pub mod state;

pub use checkpointer::{BinaryCheckpointer, Checkpointer, JsonCheckpointer};
pub use path::{CheckpointFormat, CheckpointLocation};
pub use state::{ModelState, TensorState};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during checkpoint operations.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// I/O error during checkpoint operations.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Checkpoint file not found.
    #[error("Checkpoint not found: {0}")]
    NotFound(PathBuf),

    /// Error during JSON serialization.
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Error during JSON deserialization.
    #[error("Deserialization error: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// Error in the binary encoding.
    #[error("Binary encoding error: {0}")]
    Binary(#[source] bincode::Error),

    /// A restored state does not fit the model it is loaded into.
    #[error("Checkpoint mismatch: {0}")]
    Mismatch(String),
}

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;
