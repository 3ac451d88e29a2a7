//! Inspect Command Implementation
//!
//! Encodes the dataset exactly as training would and reports the schema,
//! field cardinalities and fold sizes without fitting anything.

use anyhow::{Context, Result};
use bookrec_data::{DataPaths, EncodedDataset, RawData, Validation};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// Encode the dataset and print its schema
#[derive(Args, Debug, Clone)]
pub struct InspectCommand {
    #[arg(long, env = "BOOKREC_DATA_PATH", default_value = "/opt/ml/data/")]
    pub data_path: PathBuf,

    #[arg(long, default_value = "1")]
    pub user_version: u32,

    #[arg(long, default_value = "1")]
    pub book_version: u32,

    /// Report the stratified folds this many splits would produce
    #[arg(long, default_value = "5")]
    pub n_splits: usize,

    #[arg(long, default_value = "42")]
    pub seed: u64,
}

/// What `inspect` prints.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetReport {
    pub columns: Vec<String>,
    pub field_dims: Vec<usize>,
    pub train_rows: usize,
    pub test_rows: usize,
    /// `(train, valid)` rows per fold.
    pub folds: Vec<(usize, usize)>,
}

impl InspectCommand {
    pub fn report(&self) -> Result<DatasetReport> {
        let paths = DataPaths::new(&self.data_path, self.user_version, self.book_version);
        let raw = RawData::load(&paths)
            .with_context(|| format!("Failed to load data under {}", self.data_path.display()))?;
        let dataset = EncodedDataset::build(&raw).context("Failed to encode dataset")?;
        let folds = Validation::KFold {
            n_splits: self.n_splits,
        }
        .folds(&dataset.ratings, self.seed)
        .context("Failed to split dataset")?;

        Ok(DatasetReport {
            columns: dataset.schema.columns.clone(),
            field_dims: dataset.schema.field_dims.clone(),
            train_rows: dataset.train.rows(),
            test_rows: dataset.test.rows(),
            folds: folds.iter().map(|f| (f.train.len(), f.valid.len())).collect(),
        })
    }

    pub fn run(&self) -> Result<()> {
        info!("Inspecting {:?}", self.data_path);
        let report = self.report()?;
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
        Ok(())
    }
}
