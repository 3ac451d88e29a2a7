//! The fold loop: one fresh adapter per fold, averaged test predictions and
//! the submission written on the original rating scale.

use crate::adapter::FoldInputs;
use crate::config::{ModelKind, RunConfig};
use crate::error::{Result, TrainingError};
use crate::registry::{AdapterRegistry, ModelContext};
use crate::submission::{timestamp, write_submission};
use bookrec_data::{
    assemble, DataError, DenseFeatures, EncodedDataset, RawData, SideTable, TargetMode,
    TargetTransform,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, info_span};

/// Test predictions of every fold, one slot per fold.
#[derive(Debug, Clone)]
pub struct PredictionAccumulator {
    folds: usize,
    rows: usize,
    data: Vec<f32>,
    filled: Vec<bool>,
}

impl PredictionAccumulator {
    pub fn new(folds: usize, rows: usize) -> Self {
        Self {
            folds,
            rows,
            data: vec![0.0; folds * rows],
            filled: vec![false; folds],
        }
    }

    /// `(folds, rows)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.folds, self.rows)
    }

    pub fn set(&mut self, slot: usize, predictions: &[f32]) -> Result<()> {
        if slot >= self.folds {
            return Err(TrainingError::Config(format!(
                "fold slot {slot} out of {} folds",
                self.folds
            )));
        }
        if predictions.len() != self.rows {
            return Err(DataError::LengthMismatch {
                expected: self.rows,
                actual: predictions.len(),
            }
            .into());
        }
        self.data[slot * self.rows..(slot + 1) * self.rows].copy_from_slice(predictions);
        self.filled[slot] = true;
        Ok(())
    }

    pub fn fold(&self, slot: usize) -> &[f32] {
        &self.data[slot * self.rows..(slot + 1) * self.rows]
    }

    /// Element-wise mean over the folds.
    pub fn mean(&self) -> Result<Vec<f32>> {
        if let Some(missing) = self.filled.iter().position(|f| !f) {
            return Err(TrainingError::Config(format!(
                "fold {missing} has no predictions"
            )));
        }
        let mut mean = vec![0.0f64; self.rows];
        for slot in 0..self.folds {
            for (m, &p) in mean.iter_mut().zip(self.fold(slot)) {
                *m += p as f64;
            }
        }
        Ok(mean
            .into_iter()
            .map(|m| (m / self.folds as f64) as f32)
            .collect())
    }
}

/// Outcome of a run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub model: ModelKind,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    /// Final predictions on the original rating scale, in test order.
    pub predictions: Vec<f32>,
    /// Written submission files; empty when none were written.
    pub files: Vec<PathBuf>,
}

/// Drives a full training run for one configuration.
pub struct Orchestrator {
    config: Arc<RunConfig>,
    registry: AdapterRegistry,
}

impl Orchestrator {
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            registry: AdapterRegistry::with_defaults(),
        })
    }

    pub fn with_registry(mut self, registry: AdapterRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Loads the data, cross-validates and writes the submission.
    pub fn run(&self) -> Result<RunSummary> {
        let config = &self.config;
        let paths = config.data_paths();
        info!(model = %config.model, root = %paths.root.display(), "Loading data");
        let raw = RawData::load(&paths)?;
        let dataset = EncodedDataset::build(&raw)?;

        let (dense, dense_dims) = self.side_features(&dataset)?;
        let mut summary = self.cross_validate(&dataset, &dense, dense_dims)?;

        summary.files = write_submission(
            &raw.submission,
            &raw.test,
            &summary.predictions,
            &config.submit_path,
            config.model.as_str(),
            &timestamp(),
            config.round,
        )?;
        Ok(summary)
    }

    /// Side vectors the model family reads next to its fields.
    fn side_features(&self, dataset: &EncodedDataset) -> Result<(DenseFeatures, Vec<usize>)> {
        let paths = self.config.data_paths();
        let encoder = &dataset.encoder;
        let model = self.config.model;
        let mut dense = DenseFeatures::new();
        let mut dims = Vec::new();
        if model.needs_image() {
            let images = SideTable::read(&paths.image_vectors(), "isbn", encoder.items())?;
            dims.push(images.dim());
            dense = dense.with_source(1, Arc::new(images));
        }
        if model.needs_text() {
            let users = SideTable::read(&paths.user_text_vectors(), "user_id", encoder.users())?;
            let books = SideTable::read(&paths.book_text_vectors(), "isbn", encoder.items())?;
            dims.push(users.dim());
            dims.push(books.dim());
            dense = dense
                .with_source(0, Arc::new(users))
                .with_source(1, Arc::new(books));
        }
        if !dims.is_empty() {
            info!(model = %model, dims = ?dims, "Attached side vectors");
        }
        Ok((dense, dims))
    }

    fn target_mode(&self) -> TargetMode {
        let config = &self.config;
        if config.model.is_gbm() {
            // Boosters fit raw ratings; only the window still applies.
            TargetMode::Regression {
                zero_one: false,
                standardize: false,
                window: config.rating_window,
            }
        } else {
            config.target_mode()
        }
    }

    /// Runs every fold over an encoded dataset and averages the test
    /// predictions. Nothing is written to the submission directory.
    pub fn cross_validate(
        &self,
        dataset: &EncodedDataset,
        dense: &DenseFeatures,
        dense_dims: Vec<usize>,
    ) -> Result<RunSummary> {
        let config = &self.config;
        let factory = self.registry.get(config.model)?;
        let folds = config.validation().folds(&dataset.ratings, config.seed)?;
        let mode = self.target_mode();
        let loader_config = config.loader_config();
        let ctx = ModelContext {
            config: Arc::clone(config),
            field_dims: Arc::from(dataset.schema.field_dims.clone()),
            dense_dims,
        };

        let mut accumulator = PredictionAccumulator::new(folds.len(), dataset.test.rows());
        let mut fold_scores = Vec::with_capacity(folds.len());
        for (slot, indices) in folds.iter().enumerate() {
            let fold = indices.fold;
            let _span = info_span!("fold", fold).entered();
            let fold_result = (|| -> Result<(f64, Vec<f32>)> {
                let data = assemble(dataset, indices, &mode, dense, &loader_config)?;
                let (inputs, test) = FoldInputs::from_fold(data);
                let transform = inputs.transform;
                let mut adapter = factory.create(&ctx, inputs)?;
                let score = adapter.train(fold)?;
                let mut predictions = adapter.predict(&test)?;
                if let TargetTransform::Standard(_) = transform {
                    predictions = transform.inverse_all(&predictions);
                }
                Ok((score, predictions))
            })();
            let (score, predictions) = fold_result.map_err(|e| TrainingError::Fold {
                fold,
                source: Box::new(e),
            })?;
            info!(fold, rmse = score, "Fold finished");
            fold_scores.push(score);
            accumulator.set(slot, &predictions)?;
        }

        let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
        info!(
            model = %config.model,
            folds = fold_scores.len(),
            scores = ?fold_scores,
            mean_rmse = mean_score,
            "Cross validation finished"
        );

        let mut predictions = accumulator.mean()?;
        let gbm = config.model.is_gbm();
        if config.classifier {
            predictions = predictions
                .into_iter()
                .map(|class| {
                    let index = (class.round().max(0.0) as usize).min(config.ranges.len() - 1);
                    config.ranges.midpoint(index).unwrap_or(class)
                })
                .collect();
        } else if config.zero_one && !gbm {
            predictions.iter_mut().for_each(|p| *p *= 10.0);
        }

        Ok(RunSummary {
            model: config.model,
            fold_scores,
            mean_score,
            predictions,
            files: Vec::new(),
        })
    }
}
