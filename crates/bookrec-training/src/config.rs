//! Run configuration.
//!
//! [`RunConfig`] carries the whole configuration surface of a training
//! run and derives the typed settings each stage consumes.

use crate::error::{Result, TrainingError};
use crate::loss::LossKind;
use bookrec_checkpoint::{CheckpointFormat, CheckpointLocation};
use bookrec_data::{DataPaths, LoaderConfig, RatingRange, RatingRanges, TargetMode, Validation};
use bookrec_optimizer::{OptimizerConfig, StepLr};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Model families the registry can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelKind {
    #[default]
    #[serde(rename = "FM")]
    Fm,
    #[serde(rename = "FFM")]
    Ffm,
    #[serde(rename = "NCF")]
    Ncf,
    #[serde(rename = "WDN")]
    Wdn,
    #[serde(rename = "DCN")]
    Dcn,
    #[serde(rename = "CNN_FM")]
    CnnFm,
    #[serde(rename = "DeepCoNN")]
    DeepConn,
    #[serde(rename = "XGB")]
    Xgb,
    #[serde(rename = "LGBM")]
    Lgbm,
    #[serde(rename = "CATB")]
    Catb,
}

impl ModelKind {
    pub const ALL: [ModelKind; 10] = [
        ModelKind::Fm,
        ModelKind::Ffm,
        ModelKind::Ncf,
        ModelKind::Wdn,
        ModelKind::Dcn,
        ModelKind::CnnFm,
        ModelKind::DeepConn,
        ModelKind::Xgb,
        ModelKind::Lgbm,
        ModelKind::Catb,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::Fm => "FM",
            ModelKind::Ffm => "FFM",
            ModelKind::Ncf => "NCF",
            ModelKind::Wdn => "WDN",
            ModelKind::Dcn => "DCN",
            ModelKind::CnnFm => "CNN_FM",
            ModelKind::DeepConn => "DeepCoNN",
            ModelKind::Xgb => "XGB",
            ModelKind::Lgbm => "LGBM",
            ModelKind::Catb => "CATB",
        }
    }

    /// Boosted-tree families consume the encoded table directly.
    pub fn is_gbm(self) -> bool {
        matches!(self, ModelKind::Xgb | ModelKind::Lgbm | ModelKind::Catb)
    }

    pub fn supports_classifier(self) -> bool {
        matches!(
            self,
            ModelKind::Fm | ModelKind::Ncf | ModelKind::Wdn | ModelKind::Dcn
        )
    }

    pub fn needs_image(self) -> bool {
        self == ModelKind::CnnFm
    }

    pub fn needs_text(self) -> bool {
        self == ModelKind::DeepConn
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = TrainingError;

    fn from_str(s: &str) -> Result<Self> {
        ModelKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| TrainingError::Config(format!("unknown model '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationKind {
    Random,
    #[default]
    Kfold,
}

impl FromStr for ValidationKind {
    type Err = TrainingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(ValidationKind::Random),
            "kfold" | "k-fold" => Ok(ValidationKind::Kfold),
            other => Err(TrainingError::Config(format!("unknown validation '{other}'"))),
        }
    }
}

/// Optimizer family; all apply L2 weight decay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    /// Adam keeping the running maximum of the second moment.
    #[default]
    Amsgrad,
    Adam,
    Sgd,
}

impl FromStr for OptimizerKind {
    type Err = TrainingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "amsgrad" => Ok(OptimizerKind::Amsgrad),
            "adam" => Ok(OptimizerKind::Adam),
            "sgd" => Ok(OptimizerKind::Sgd),
            other => Err(TrainingError::Config(format!("unknown optimizer '{other}'"))),
        }
    }
}

/// Step learning-rate decay applied after each epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub step_size: u64,
    pub gamma: f32,
}

/// Per-family hyper-parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    pub fm_embed_dim: usize,
    pub ffm_embed_dim: usize,
    pub ncf_embed_dim: usize,
    pub ncf_mlp_dims: Vec<usize>,
    pub ncf_dropout: f32,
    pub wdn_embed_dim: usize,
    pub wdn_mlp_dims: Vec<usize>,
    pub wdn_dropout: f32,
    pub dcn_embed_dim: usize,
    pub dcn_mlp_dims: Vec<usize>,
    pub dcn_dropout: f32,
    pub dcn_num_layers: usize,
    pub cnn_fm_embed_dim: usize,
    pub cnn_fm_latent_dim: usize,
    pub deepconn_embed_dim: usize,
    pub deepconn_latent_dim: usize,
    pub deepconn_out_dim: usize,
    /// Fitting budget of the boosted-tree families.
    pub gbm_budget: f32,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            fm_embed_dim: 16,
            ffm_embed_dim: 16,
            ncf_embed_dim: 16,
            ncf_mlp_dims: vec![16, 16],
            ncf_dropout: 0.2,
            wdn_embed_dim: 16,
            wdn_mlp_dims: vec![16, 16],
            wdn_dropout: 0.2,
            dcn_embed_dim: 16,
            dcn_mlp_dims: vec![16, 16],
            dcn_dropout: 0.2,
            dcn_num_layers: 3,
            cnn_fm_embed_dim: 128,
            cnn_fm_latent_dim: 8,
            deepconn_embed_dim: 32,
            deepconn_latent_dim: 10,
            deepconn_out_dim: 32,
            gbm_budget: 0.5,
        }
    }
}

/// Full configuration of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub data_path: PathBuf,
    pub save_path: PathBuf,
    pub submit_path: PathBuf,
    pub user_version: u32,
    pub book_version: u32,

    pub model: ModelKind,

    pub valid: ValidationKind,
    pub n_splits: usize,
    pub test_size: f64,
    pub seed: u64,
    pub data_shuffle: bool,

    pub batch_size: usize,
    pub epochs: usize,
    pub lr: f32,
    pub weight_decay: f32,
    pub patience: u64,
    pub optimizer: OptimizerKind,
    pub scheduler: Option<SchedulerConfig>,
    /// Running train loss is logged every this many batches.
    pub log_interval: usize,

    pub loss: LossKind,
    /// Transition point of smooth L1 and Huber.
    pub beta: f32,

    pub zero_one: bool,
    pub scaler: bool,
    pub round: bool,
    pub classifier: bool,
    pub ranges: RatingRanges,
    pub class_weights: Vec<f32>,
    pub rating_window: Option<RatingRange>,

    pub checkpoint_format: CheckpointFormat,
    pub params: ModelParams,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("/opt/ml/data/"),
            save_path: PathBuf::from("/opt/ml/weights/"),
            submit_path: PathBuf::from("/opt/ml/data/submit/"),
            user_version: 1,
            book_version: 1,
            model: ModelKind::default(),
            valid: ValidationKind::default(),
            n_splits: 5,
            test_size: 0.2,
            seed: 42,
            data_shuffle: true,
            batch_size: 64,
            epochs: 50,
            lr: 1e-4,
            weight_decay: 1e-5,
            patience: 3,
            optimizer: OptimizerKind::default(),
            scheduler: None,
            log_interval: 100,
            loss: LossKind::default(),
            beta: 1.0,
            zero_one: false,
            scaler: false,
            round: false,
            classifier: false,
            ranges: RatingRanges::default(),
            class_weights: vec![0.43, 0.27, 0.35],
            rating_window: None,
            checkpoint_format: CheckpointFormat::default(),
            params: ModelParams::default(),
        }
    }
}

impl RunConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|source| TrainingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes)
            .map_err(|e| TrainingError::Config(format!("{}: {e}", path.display())))
    }

    /// Rejects inconsistent combinations before any data is read.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(TrainingError::Config(msg));
        if self.batch_size == 0 {
            return fail("batch_size must be positive".to_string());
        }
        if self.epochs == 0 && !self.model.is_gbm() {
            return fail("epochs must be positive".to_string());
        }
        match self.valid {
            ValidationKind::Kfold if self.n_splits < 2 => {
                return fail(format!("n_splits must be at least 2, got {}", self.n_splits));
            }
            ValidationKind::Random if !(self.test_size > 0.0 && self.test_size < 1.0) => {
                return fail(format!("test_size must be in (0, 1), got {}", self.test_size));
            }
            _ => {}
        }
        if self.zero_one && self.scaler {
            return fail("zero_one and scaler are mutually exclusive".to_string());
        }
        if self.classifier {
            if !self.model.supports_classifier() {
                return fail(format!("{} cannot run in classifier mode", self.model));
            }
            if self.zero_one || self.scaler {
                return fail("classifier mode does not rescale targets".to_string());
            }
            if self.class_weights.len() != self.ranges.len() {
                return fail(format!(
                    "{} class weights for {} ranges",
                    self.class_weights.len(),
                    self.ranges.len()
                ));
            }
        }
        if self.beta <= 0.0 {
            return fail(format!("beta must be positive, got {}", self.beta));
        }
        if let Some(s) = &self.scheduler {
            if s.step_size == 0 || s.gamma <= 0.0 {
                return fail("scheduler needs a positive step size and gamma".to_string());
            }
        }
        self.optimizer_config().validate()?;
        Ok(())
    }

    pub fn data_paths(&self) -> DataPaths {
        DataPaths::new(&self.data_path, self.user_version, self.book_version)
    }

    pub fn validation(&self) -> Validation {
        match self.valid {
            ValidationKind::Random => Validation::Random {
                test_size: self.test_size,
            },
            ValidationKind::Kfold => Validation::KFold {
                n_splits: self.n_splits,
            },
        }
    }

    pub fn target_mode(&self) -> TargetMode {
        if self.classifier {
            TargetMode::Classification {
                ranges: self.ranges.clone(),
            }
        } else {
            TargetMode::Regression {
                zero_one: self.zero_one,
                standardize: self.scaler,
                window: self.rating_window,
            }
        }
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            batch_size: self.batch_size,
            shuffle: self.data_shuffle,
            seed: self.seed,
        }
    }

    pub fn optimizer_config(&self) -> OptimizerConfig {
        match self.optimizer {
            OptimizerKind::Amsgrad => OptimizerConfig::amsgrad(self.lr, self.weight_decay),
            OptimizerKind::Adam => OptimizerConfig::adam(self.lr, self.weight_decay),
            OptimizerKind::Sgd => OptimizerConfig::Sgd {
                learning_rate: self.lr,
                weight_decay: self.weight_decay,
            },
        }
    }

    pub fn schedule(&self) -> Option<StepLr> {
        self.scheduler.map(|s| StepLr::new(s.step_size, s.gamma))
    }

    pub fn checkpoint_location(&self) -> CheckpointLocation {
        CheckpointLocation::new(
            &self.save_path,
            self.model.as_str(),
            self.user_version,
            self.book_version,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RunConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.validation(), Validation::KFold { n_splits: 5 });
        assert_eq!(config.optimizer_config().name(), "Amsgrad");
        assert_eq!(config.ranges.to_string(), "1-4,5-7,8-10");
    }

    #[test]
    fn test_optimizer_selection() {
        let pick = |name: &str| RunConfig {
            optimizer: name.parse().unwrap(),
            ..Default::default()
        };
        assert_eq!(pick("adam").optimizer_config().name(), "Adam");
        assert_eq!(pick("AMSGrad").optimizer_config().name(), "Amsgrad");
        assert_eq!(pick("sgd").optimizer_config().name(), "Sgd");
        assert!("rmsprop".parse::<OptimizerKind>().is_err());
    }

    #[test]
    fn test_model_names_round_trip() {
        for kind in ModelKind::ALL {
            assert_eq!(kind.as_str().parse::<ModelKind>().unwrap(), kind);
        }
        assert_eq!("deepconn".parse::<ModelKind>().unwrap(), ModelKind::DeepConn);
        assert!("SVD".parse::<ModelKind>().is_err());
        assert_eq!(
            serde_json::to_string(&ModelKind::CnnFm).unwrap(),
            "\"CNN_FM\""
        );
    }

    #[test]
    fn test_rejects_inconsistent_config() {
        let mut config = RunConfig {
            zero_one: true,
            scaler: true,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config = RunConfig {
            model: ModelKind::Ffm,
            classifier: true,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config = RunConfig {
            valid: ValidationKind::Kfold,
            n_splits: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config = RunConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"model": "NCF", "classifier": true, "params": {"ncf_embed_dim": 8}}"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.model, ModelKind::Ncf);
        assert_eq!(config.params.ncf_embed_dim, 8);
        assert_eq!(config.params.ncf_mlp_dims, vec![16, 16]);
        assert_eq!(config.batch_size, 64);
        assert!(config.validate().is_ok());
        assert!(matches!(
            config.target_mode(),
            TargetMode::Classification { .. }
        ));
    }

    #[test]
    fn test_checkpoint_location_uses_model_name() {
        let config = RunConfig {
            model: ModelKind::CnnFm,
            save_path: PathBuf::from("/w"),
            user_version: 2,
            book_version: 3,
            ..Default::default()
        };
        assert_eq!(
            config.checkpoint_location().file(1, CheckpointFormat::Json),
            PathBuf::from("/w/CNN_FM/u02_b03/fold1/checkpoint.json")
        );
    }
}
