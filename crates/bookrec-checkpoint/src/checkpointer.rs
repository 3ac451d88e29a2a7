//! Checkpointer trait for save/restore operations.

use crate::state::ModelState;
use crate::{CheckpointError, Result};
use std::path::Path;

/// Trait for checkpoint serialization and deserialization.
///
/// Implementors of this trait provide the logic for saving and restoring
/// model state to/from persistent storage.
pub trait Checkpointer: Send + Sync {
    /// Save model state to the specified path, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or I/O fails.
    fn save(&self, path: &Path, state: &ModelState) -> Result<()>;

    /// Restore model state from the specified path.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::NotFound`] if nothing was saved at `path`,
    /// or an error if the file is unreadable or corrupted.
    fn restore(&self, path: &Path) -> Result<ModelState>;
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CheckpointError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(path, bytes).map_err(|e| CheckpointError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::debug!(path = %path.display(), size = bytes.len(), "Checkpoint saved");
    Ok(())
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(CheckpointError::NotFound(path.to_path_buf()));
    }
    std::fs::read(path).map_err(|e| CheckpointError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// JSON-based checkpoint implementation.
///
/// Human-readable; the default format.
#[derive(Debug, Clone, Default)]
pub struct JsonCheckpointer {
    /// Whether to pretty-print JSON output.
    pub pretty: bool,
}

impl JsonCheckpointer {
    /// Create a new JSON checkpointer.
    pub fn new() -> Self {
        Self { pretty: false }
    }

    /// Create a new JSON checkpointer with pretty printing.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Checkpointer for JsonCheckpointer {
    fn save(&self, path: &Path, state: &ModelState) -> Result<()> {
        tracing::info!(
            path = %path.display(),
            epoch = state.epoch,
            score = state.score,
            "Saving checkpoint"
        );
        let json = if self.pretty {
            serde_json::to_vec_pretty(state)
        } else {
            serde_json::to_vec(state)
        }
        .map_err(CheckpointError::Serialization)?;
        write_file(path, &json)
    }

    fn restore(&self, path: &Path) -> Result<ModelState> {
        tracing::info!(path = %path.display(), "Restoring checkpoint");
        let json = read_file(path)?;
        let state: ModelState =
            serde_json::from_slice(&json).map_err(CheckpointError::Deserialization)?;
        tracing::info!(
            path = %path.display(),
            epoch = state.epoch,
            tensors = state.tensors.len(),
            "Checkpoint restored"
        );
        Ok(state)
    }
}

/// Binary checkpoint implementation using bincode.
///
/// More compact than JSON, but not human-readable.
#[derive(Debug, Clone, Default)]
pub struct BinaryCheckpointer;

impl BinaryCheckpointer {
    /// Create a new binary checkpointer.
    pub fn new() -> Self {
        Self
    }
}

impl Checkpointer for BinaryCheckpointer {
    fn save(&self, path: &Path, state: &ModelState) -> Result<()> {
        tracing::info!(
            path = %path.display(),
            epoch = state.epoch,
            score = state.score,
            "Saving binary checkpoint"
        );
        let bytes = bincode::serialize(state).map_err(CheckpointError::Binary)?;
        write_file(path, &bytes)
    }

    fn restore(&self, path: &Path) -> Result<ModelState> {
        tracing::info!(path = %path.display(), "Restoring binary checkpoint");
        let bytes = read_file(path)?;
        bincode::deserialize(&bytes).map_err(CheckpointError::Binary)
    }
}
