//! Checkpoint path layout.
//!
//! `{save_root}/{MODEL}/u{NN}_b{NN}/fold{n}/checkpoint.{json|bin}`: one
//! directory per (model, dataset version pair, fold), so folds never
//! share a file.

use crate::checkpointer::{BinaryCheckpointer, Checkpointer, JsonCheckpointer};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// On-disk checkpoint encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointFormat {
    #[default]
    Json,
    Binary,
}

impl CheckpointFormat {
    pub fn extension(self) -> &'static str {
        match self {
            CheckpointFormat::Json => "json",
            CheckpointFormat::Binary => "bin",
        }
    }

    pub fn checkpointer(self) -> Box<dyn Checkpointer> {
        match self {
            CheckpointFormat::Json => Box::new(JsonCheckpointer::new()),
            CheckpointFormat::Binary => Box::new(BinaryCheckpointer::new()),
        }
    }
}

/// Inputs that determine where a run's checkpoints live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointLocation {
    pub save_root: PathBuf,
    pub model: String,
    pub user_version: u32,
    pub book_version: u32,
}

impl CheckpointLocation {
    pub fn new(
        save_root: impl Into<PathBuf>,
        model: impl Into<String>,
        user_version: u32,
        book_version: u32,
    ) -> Self {
        Self {
            save_root: save_root.into(),
            model: model.into(),
            user_version,
            book_version,
        }
    }

    pub fn fold_dir(&self, fold: usize) -> PathBuf {
        self.save_root
            .join(&self.model)
            .join(format!("u{:02}_b{:02}", self.user_version, self.book_version))
            .join(format!("fold{fold}"))
    }

    pub fn file(&self, fold: usize, format: CheckpointFormat) -> PathBuf {
        self.fold_dir(fold)
            .join(format!("checkpoint.{}", format.extension()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_shape() {
        let loc = CheckpointLocation::new("/w", "DeepCoNN", 3, 11);
        assert_eq!(
            loc.file(2, CheckpointFormat::Json),
            PathBuf::from("/w/DeepCoNN/u03_b11/fold2/checkpoint.json")
        );
        assert_eq!(
            loc.file(0, CheckpointFormat::Binary),
            PathBuf::from("/w/DeepCoNN/u03_b11/fold0/checkpoint.bin")
        );
    }

    #[test]
    fn test_folds_are_disjoint() {
        let loc = CheckpointLocation::new("/w", "FM", 1, 1);
        assert_ne!(loc.fold_dir(0), loc.fold_dir(1));
    }
}
