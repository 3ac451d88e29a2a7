//! Train Command Implementation
//!
//! Builds a [`RunConfig`] from an optional JSON file and command-line flags,
//! then runs the fold orchestrator. Flags that are given override the file;
//! flags that are not given leave it untouched.

use anyhow::{Context, Result};
use bookrec_checkpoint::CheckpointFormat;
use bookrec_data::{RatingRange, RatingRanges};
use bookrec_training::{
    LossKind, ModelKind, OptimizerKind, Orchestrator, RunConfig, SchedulerConfig, ValidationKind,
};
use clap::Args;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CheckpointFormatArg {
    Json,
    Binary,
}

impl From<CheckpointFormatArg> for CheckpointFormat {
    fn from(arg: CheckpointFormatArg) -> Self {
        match arg {
            CheckpointFormatArg::Json => CheckpointFormat::Json,
            CheckpointFormatArg::Binary => CheckpointFormat::Binary,
        }
    }
}

/// Train a model family with random-split or k-fold validation
///
/// # Example
///
/// ```bash
/// bookrec train \
///     --data-path /opt/ml/data \
///     --model NCF \
///     --valid kfold --n-splits 5 \
///     --classifier
/// ```
#[derive(Args, Debug, Clone, Default)]
pub struct TrainCommand {
    /// Base configuration (JSON); flags below override its fields
    #[arg(long, short = 'c', env = "BOOKREC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the merged configuration and exit
    #[arg(long)]
    pub print_config: bool,

    // ---------------------------------------------------------------------
    // Paths
    // ---------------------------------------------------------------------
    #[arg(long, env = "BOOKREC_DATA_PATH")]
    pub data_path: Option<PathBuf>,

    #[arg(long)]
    pub save_path: Option<PathBuf>,

    #[arg(long)]
    pub submit_path: Option<PathBuf>,

    /// Two-digit suffix of `users/uNN.csv`
    #[arg(long)]
    pub user_version: Option<u32>,

    /// Two-digit suffix of `books/bNN.csv`
    #[arg(long)]
    pub book_version: Option<u32>,

    // ---------------------------------------------------------------------
    // Model and validation
    // ---------------------------------------------------------------------
    /// FM, FFM, NCF, WDN, DCN, CNN_FM, DeepCoNN, XGB, LGBM or CATB
    #[arg(long, short = 'm')]
    pub model: Option<ModelKind>,

    /// `random` or `kfold`
    #[arg(long)]
    pub valid: Option<ValidationKind>,

    #[arg(long)]
    pub n_splits: Option<usize>,

    /// Held-out share of the random split
    #[arg(long)]
    pub test_size: Option<f64>,

    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub data_shuffle: Option<bool>,

    // ---------------------------------------------------------------------
    // Optimization
    // ---------------------------------------------------------------------
    #[arg(long, short = 'b')]
    pub batch_size: Option<usize>,

    #[arg(long, short = 'e')]
    pub epochs: Option<usize>,

    #[arg(long)]
    pub lr: Option<f32>,

    #[arg(long)]
    pub weight_decay: Option<f32>,

    /// Epochs without validation improvement before stopping
    #[arg(long)]
    pub patience: Option<u64>,

    /// `amsgrad`, `adam` or `sgd`
    #[arg(long)]
    pub optimizer: Option<OptimizerKind>,

    /// Decay the learning rate every this many epochs
    #[arg(long, requires = "gamma")]
    pub step_size: Option<u64>,

    #[arg(long, requires = "step_size")]
    pub gamma: Option<f32>,

    #[arg(long)]
    pub log_interval: Option<usize>,

    /// `rmse`, `sl1` or `huber`
    #[arg(long)]
    pub loss: Option<LossKind>,

    #[arg(long)]
    pub beta: Option<f32>,

    // ---------------------------------------------------------------------
    // Targets and output
    // ---------------------------------------------------------------------
    /// Train on ratings divided by ten
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub zero_one: Option<bool>,

    /// Standardize targets with the fold's training statistics
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub scaler: Option<bool>,

    /// Also write a submission with integer ratings
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub round: Option<bool>,

    /// Predict rating ranges instead of ratings
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub classifier: Option<bool>,

    /// Classification ranges, e.g. `1-4,5-7,8-10`
    #[arg(long)]
    pub ranges: Option<RatingRanges>,

    #[arg(long, value_delimiter = ',')]
    pub class_weights: Option<Vec<f32>>,

    /// Keep only train/valid ratings inside this range, e.g. `3-10`
    #[arg(long)]
    pub rating_window: Option<RatingRange>,

    #[arg(long, value_enum)]
    pub checkpoint_format: Option<CheckpointFormatArg>,

    // ---------------------------------------------------------------------
    // Family hyper-parameters
    // ---------------------------------------------------------------------
    #[arg(long)]
    pub fm_embed_dim: Option<usize>,

    #[arg(long)]
    pub ffm_embed_dim: Option<usize>,

    #[arg(long)]
    pub ncf_embed_dim: Option<usize>,

    #[arg(long, value_delimiter = ',')]
    pub ncf_mlp_dims: Option<Vec<usize>>,

    #[arg(long)]
    pub ncf_dropout: Option<f32>,

    #[arg(long)]
    pub wdn_embed_dim: Option<usize>,

    #[arg(long, value_delimiter = ',')]
    pub wdn_mlp_dims: Option<Vec<usize>>,

    #[arg(long)]
    pub wdn_dropout: Option<f32>,

    #[arg(long)]
    pub dcn_embed_dim: Option<usize>,

    #[arg(long, value_delimiter = ',')]
    pub dcn_mlp_dims: Option<Vec<usize>>,

    #[arg(long)]
    pub dcn_dropout: Option<f32>,

    #[arg(long)]
    pub dcn_num_layers: Option<usize>,

    #[arg(long)]
    pub cnn_fm_embed_dim: Option<usize>,

    #[arg(long)]
    pub cnn_fm_latent_dim: Option<usize>,

    #[arg(long)]
    pub deepconn_embed_dim: Option<usize>,

    #[arg(long)]
    pub deepconn_latent_dim: Option<usize>,

    #[arg(long)]
    pub deepconn_out_dim: Option<usize>,

    #[arg(long)]
    pub gbm_budget: Option<f32>,
}

impl TrainCommand {
    /// The file configuration (or defaults) with every given flag applied.
    pub fn resolve(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => {
                info!("Loading config from: {:?}", path);
                RunConfig::from_json_file(path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?
            }
            None => {
                warn!("No config file provided, using default configuration");
                RunConfig::default()
            }
        };

        macro_rules! override_field {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = &self.$field {
                    config.$field = value.clone();
                })*
            };
        }
        macro_rules! override_param {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = &self.$field {
                    config.params.$field = value.clone();
                })*
            };
        }

        override_field!(
            data_path,
            save_path,
            submit_path,
            user_version,
            book_version,
            model,
            valid,
            n_splits,
            test_size,
            seed,
            data_shuffle,
            batch_size,
            epochs,
            lr,
            weight_decay,
            patience,
            optimizer,
            log_interval,
            loss,
            beta,
            zero_one,
            scaler,
            round,
            classifier,
            ranges,
            class_weights,
        );
        override_param!(
            fm_embed_dim,
            ffm_embed_dim,
            ncf_embed_dim,
            ncf_mlp_dims,
            ncf_dropout,
            wdn_embed_dim,
            wdn_mlp_dims,
            wdn_dropout,
            dcn_embed_dim,
            dcn_mlp_dims,
            dcn_dropout,
            dcn_num_layers,
            cnn_fm_embed_dim,
            cnn_fm_latent_dim,
            deepconn_embed_dim,
            deepconn_latent_dim,
            deepconn_out_dim,
            gbm_budget,
        );
        if let Some(window) = self.rating_window {
            config.rating_window = Some(window);
        }
        if let (Some(step_size), Some(gamma)) = (self.step_size, self.gamma) {
            config.scheduler = Some(SchedulerConfig { step_size, gamma });
        }
        if let Some(format) = self.checkpoint_format {
            config.checkpoint_format = format.into();
        }
        Ok(config)
    }

    pub fn run(&self) -> Result<()> {
        let config = self.resolve()?;
        if self.print_config {
            println!(
                "{}",
                serde_json::to_string_pretty(&config).context("Failed to serialize config")?
            );
            return Ok(());
        }

        info!(
            "Training {} with batch_size={}, epochs={}, lr={}",
            config.model, config.batch_size, config.epochs, config.lr
        );
        let orchestrator = Orchestrator::new(config).context("Invalid configuration")?;
        let summary = orchestrator.run().context("Training run failed")?;

        for (fold, score) in summary.fold_scores.iter().enumerate() {
            info!("fold {}: valid RMSE {:.4}", fold, score);
        }
        info!("{} mean valid RMSE {:.4}", summary.model, summary.mean_score);
        for file in &summary.files {
            info!("Submission written to {}", file.display());
        }
        Ok(())
    }
}
