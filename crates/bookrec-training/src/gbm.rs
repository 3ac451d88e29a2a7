//! Gradient-boosted trees over the encoded field table.
//!
//! The `XGB`, `LGBM` and `CATB` families all map onto a perpetual
//! booster. Features are the raw field codes as `f64`; targets are
//! untransformed ratings.

use crate::adapter::{AdapterState, FoldInputs, ModelAdapter};
use crate::config::ModelKind;
use crate::error::{Result, TrainingError};
use crate::metrics;
use bookrec_checkpoint::{CheckpointFormat, CheckpointLocation};
use bookrec_data::{DataLoader, Targets};
use perpetual::booster::config::BoosterIO;
use perpetual::objective::Objective;
use perpetual::{Matrix, PerpetualBooster};
use std::path::PathBuf;
use tracing::info;

pub struct GbmAdapter {
    kind: ModelKind,
    budget: f32,
    inputs: FoldInputs,
    location: CheckpointLocation,
    booster: Option<PerpetualBooster>,
    state: AdapterState,
}

impl GbmAdapter {
    pub fn new(kind: ModelKind, budget: f32, inputs: FoldInputs, location: CheckpointLocation) -> Self {
        Self {
            kind,
            budget,
            inputs,
            location,
            booster: None,
            state: AdapterState::Constructed,
        }
    }

    /// perpetual writes its own JSON, so the path always ends in `.json`.
    fn model_path(&self, fold: usize) -> PathBuf {
        self.location.file(fold, CheckpointFormat::Json)
    }

    fn predict_with(booster: &PerpetualBooster, loader: &DataLoader) -> Vec<f32> {
        let fields = loader.fields();
        let data = fields.to_column_major_f64();
        let matrix = Matrix::new(&data, fields.rows(), fields.num_fields());
        booster
            .predict(&matrix, true)
            .into_iter()
            .map(|p| p as f32)
            .collect()
    }
}

impl ModelAdapter for GbmAdapter {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    fn state(&self) -> AdapterState {
        self.state
    }

    fn train(&mut self, fold: usize) -> Result<f64> {
        self.state.require(AdapterState::Constructed)?;
        self.state = AdapterState::Training;

        let train = &self.inputs.train;
        let Some(Targets::Regression(targets)) = train.targets() else {
            return Err(TrainingError::Config(
                "boosted trees need regression targets".to_string(),
            ));
        };
        let y: Vec<f64> = self
            .inputs
            .transform
            .inverse_all(targets)
            .into_iter()
            .map(f64::from)
            .collect();
        let fields = train.fields();
        let data = fields.to_column_major_f64();
        let matrix = Matrix::new(&data, fields.rows(), fields.num_fields());

        let mut booster = PerpetualBooster::default()
            .set_objective(Objective::SquaredLoss)
            .set_budget(self.budget);
        booster
            .fit(&matrix, &y, None, None)
            .map_err(|e| TrainingError::Booster(e.to_string()))?;
        info!(
            fold,
            model = self.kind.as_str(),
            trees = booster.get_prediction_trees().len(),
            "Fitted booster"
        );
        self.state = AdapterState::Exhausted;

        let path = self.model_path(fold);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| TrainingError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let path_str = path.to_string_lossy().into_owned();
        booster
            .save_booster(&path_str)
            .map_err(|e| TrainingError::Booster(e.to_string()))?;
        let booster = PerpetualBooster::load_booster(&path_str)
            .map_err(|e| TrainingError::Booster(e.to_string()))?;
        info!(path = %path.display(), "Booster saved and reloaded");

        let predicted = Self::predict_with(&booster, &self.inputs.valid);
        let score = metrics::rmse(&self.inputs.valid_ratings, &predicted);
        self.booster = Some(booster);
        self.state = AdapterState::Ready;
        info!(fold, rmse = score, "Validation");
        Ok(score)
    }

    fn predict(&mut self, loader: &DataLoader) -> Result<Vec<f32>> {
        self.state.require(AdapterState::Ready)?;
        let booster = self.booster.as_ref().ok_or(TrainingError::InvalidState {
            expected: AdapterState::Ready.as_str(),
            actual: AdapterState::Constructed.as_str(),
        })?;
        Ok(Self::predict_with(booster, loader))
    }
}
