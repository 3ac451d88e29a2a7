//! Adapter construction keyed by model family.
//!
//! The orchestrator asks the registry for a factory once per run and then
//! builds a fresh adapter for every fold.

use crate::adapter::{FoldInputs, ModelAdapter};
use crate::config::{ModelKind, RunConfig};
use crate::error::{Result, TrainingError};
use crate::gbm::GbmAdapter;
use crate::loss::Loss;
use crate::models::{CnnFmModel, DcnModel, DeepConnModel, FfmModel, FmModel, NcfModel, WdnModel};
use crate::network::Network;
use crate::neural::{NeuralAdapter, TrainSettings};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::Arc;

/// Run-wide inputs every adapter of a run shares.
#[derive(Debug, Clone)]
pub struct ModelContext {
    pub config: Arc<RunConfig>,
    pub field_dims: Arc<[usize]>,
    /// Width of each dense side source, in attachment order.
    pub dense_dims: Vec<usize>,
}

/// Builds one adapter per fold.
pub trait AdapterFactory: Send + Sync {
    fn create(&self, ctx: &ModelContext, inputs: FoldInputs) -> Result<Box<dyn ModelAdapter>>;
}

/// Factory for the embedding-based neural families.
#[derive(Debug, Clone, Copy)]
pub struct NeuralFactory {
    kind: ModelKind,
}

impl NeuralFactory {
    pub fn new(kind: ModelKind) -> Self {
        Self { kind }
    }

    fn network(&self, ctx: &ModelContext, rng: &mut StdRng) -> Result<Box<dyn Network>> {
        let config = &ctx.config;
        let p = &config.params;
        let dims = &ctx.field_dims[..];
        let out = if config.classifier { config.ranges.len() } else { 1 };
        let dense = |i: usize| ctx.dense_dims.get(i).copied().unwrap_or(0);
        let network: Box<dyn Network> = match self.kind {
            ModelKind::Fm => Box::new(FmModel::new(dims, p.fm_embed_dim, out, rng)?),
            ModelKind::Ffm => Box::new(FfmModel::new(dims, p.ffm_embed_dim, rng)?),
            ModelKind::Ncf => Box::new(NcfModel::new(
                dims,
                p.ncf_embed_dim,
                &p.ncf_mlp_dims,
                p.ncf_dropout,
                out,
                rng,
            )?),
            ModelKind::Wdn => Box::new(WdnModel::new(
                dims,
                p.wdn_embed_dim,
                &p.wdn_mlp_dims,
                p.wdn_dropout,
                out,
                rng,
            )?),
            ModelKind::Dcn => Box::new(DcnModel::new(
                dims,
                p.dcn_embed_dim,
                p.dcn_num_layers,
                &p.dcn_mlp_dims,
                p.dcn_dropout,
                out,
                rng,
            )?),
            ModelKind::CnnFm => Box::new(CnnFmModel::new(
                dims,
                dense(0),
                p.cnn_fm_embed_dim,
                p.cnn_fm_latent_dim,
                rng,
            )?),
            ModelKind::DeepConn => Box::new(DeepConnModel::new(
                dims,
                dense(0),
                dense(1),
                p.deepconn_embed_dim,
                p.deepconn_out_dim,
                p.deepconn_latent_dim,
                rng,
            )?),
            kind => {
                return Err(TrainingError::Config(format!(
                    "{kind} is not a neural family"
                )))
            }
        };
        Ok(network)
    }
}

impl AdapterFactory for NeuralFactory {
    fn create(&self, ctx: &ModelContext, inputs: FoldInputs) -> Result<Box<dyn ModelAdapter>> {
        let config = &ctx.config;
        let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(inputs.fold as u64));
        let network = self.network(ctx, &mut rng)?;
        let loss = if config.classifier {
            Loss::CrossEntropy {
                weights: config.class_weights.clone(),
            }
        } else {
            Loss::regression(config.loss, config.beta)
        };
        let settings = TrainSettings {
            epochs: config.epochs,
            patience: config.patience,
            log_interval: config.log_interval,
            optimizer: config.optimizer_config(),
            schedule: config.schedule(),
            location: config.checkpoint_location(),
            format: config.checkpoint_format,
        };
        Ok(Box::new(NeuralAdapter::new(network, loss, inputs, settings)?))
    }
}

/// Factory for the boosted-tree families.
#[derive(Debug, Clone, Copy)]
pub struct GbmFactory {
    kind: ModelKind,
}

impl GbmFactory {
    pub fn new(kind: ModelKind) -> Self {
        Self { kind }
    }
}

impl AdapterFactory for GbmFactory {
    fn create(&self, ctx: &ModelContext, inputs: FoldInputs) -> Result<Box<dyn ModelAdapter>> {
        Ok(Box::new(GbmAdapter::new(
            self.kind,
            ctx.config.params.gbm_budget,
            inputs,
            ctx.config.checkpoint_location(),
        )))
    }
}

/// Factories by model family.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    factories: HashMap<ModelKind, Arc<dyn AdapterFactory>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in family.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for kind in ModelKind::ALL {
            if kind.is_gbm() {
                registry.register(kind, GbmFactory::new(kind));
            } else {
                registry.register(kind, NeuralFactory::new(kind));
            }
        }
        registry
    }

    /// Adds or replaces the factory of `kind`.
    pub fn register<F: AdapterFactory + 'static>(&mut self, kind: ModelKind, factory: F) {
        self.factories.insert(kind, Arc::new(factory));
    }

    pub fn get(&self, kind: ModelKind) -> Result<Arc<dyn AdapterFactory>> {
        self.factories
            .get(&kind)
            .cloned()
            .ok_or_else(|| TrainingError::Config(format!("no adapter registered for {kind}")))
    }
}
