//! Model training, fold orchestration and submission output for book
//! rating prediction.
//!
//! - **Adapters**: every model family is driven through [`ModelAdapter`],
//!   a per-fold train/predict contract with an explicit state machine
//! - **Models**: seven embedding-based networks over encoded field vectors
//!   and a gradient-boosted tree adapter
//! - **Hooks**: per-epoch logging and early stopping
//! - **Orchestrator**: the k-fold loop, prediction averaging and rescaling
//!
//! ```text
//! RunConfig ─► Orchestrator ─► AdapterRegistry ─► ModelAdapter (one per fold)
//!                   │                                   │
//!                   │◄──── fold score, test predictions ┘
//!                   ▼
//!          PredictionAccumulator ─► submission CSV
//! ```
//!
//! # Example
//!
//! ```
//! use bookrec_training::{ModelKind, Orchestrator, RunConfig};
//!
//! let config = RunConfig {
//!     model: ModelKind::Ncf,
//!     epochs: 10,
//!     ..Default::default()
//! };
//! let orchestrator = Orchestrator::new(config).unwrap();
//! assert_eq!(orchestrator.config().n_splits, 5);
//! // let summary = orchestrator.run().unwrap();
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod gbm;
pub mod hooks;
pub mod loss;
pub mod metrics;
pub mod models;
pub mod network;
pub mod neural;
pub mod orchestrator;
pub mod registry;
pub mod submission;

pub use adapter::{AdapterState, FoldInputs, ModelAdapter};
pub use config::{ModelKind, ModelParams, OptimizerKind, RunConfig, SchedulerConfig, ValidationKind};
pub use error::{Result, TrainingError};
pub use gbm::GbmAdapter;
pub use hooks::{EarlyStoppingHook, Hook, HookAction, HookError, HookList, LoggingHook};
pub use loss::{Loss, LossKind};
pub use metrics::Metrics;
pub use network::Network;
pub use neural::{NeuralAdapter, TrainSettings};
pub use orchestrator::{Orchestrator, PredictionAccumulator, RunSummary};
pub use registry::{AdapterFactory, AdapterRegistry, GbmFactory, ModelContext, NeuralFactory};
pub use submission::write_submission;
