//! Adapter for the neural families: mini-batch training with per-epoch
//! validation, early stopping and best-checkpoint restore.

use crate::adapter::{AdapterState, FoldInputs, ModelAdapter};
use crate::error::{Result, TrainingError};
use crate::hooks::{EarlyStoppingHook, Hook, HookAction, HookList, LoggingHook};
use crate::loss::Loss;
use crate::metrics::{self, Metrics};
use crate::network::{export_state, load_state, Network};
use bookrec_checkpoint::{CheckpointFormat, CheckpointLocation, Checkpointer};
use bookrec_data::{DataLoader, Targets};
use bookrec_optimizer::{create_optimizer, OptimizerConfig, OptimizerDyn, StepLr};
use std::path::PathBuf;
use tracing::{debug, info};

/// Loop settings shared by every neural family.
#[derive(Debug, Clone)]
pub struct TrainSettings {
    pub epochs: usize,
    pub patience: u64,
    /// Log the running train loss every this many batches.
    pub log_interval: usize,
    pub optimizer: OptimizerConfig,
    pub schedule: Option<StepLr>,
    pub location: CheckpointLocation,
    pub format: CheckpointFormat,
}

#[derive(Debug, Clone, Copy)]
struct Evaluation {
    rmse: f64,
    accuracy: Option<f64>,
}

pub struct NeuralAdapter {
    network: Box<dyn Network>,
    /// One optimizer per parameter tensor, in `params_and_grads` order.
    optimizers: Vec<Box<dyn OptimizerDyn>>,
    loss: Loss,
    inputs: FoldInputs,
    settings: TrainSettings,
    checkpointer: Box<dyn Checkpointer>,
    state: AdapterState,
}

impl NeuralAdapter {
    pub fn new(
        mut network: Box<dyn Network>,
        loss: Loss,
        inputs: FoldInputs,
        settings: TrainSettings,
    ) -> Result<Self> {
        let optimizers = network
            .params_and_grads()
            .iter()
            .map(|_| create_optimizer(settings.optimizer.clone()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            checkpointer: settings.format.checkpointer(),
            network,
            optimizers,
            loss,
            inputs,
            settings,
            state: AdapterState::Constructed,
        })
    }

    fn is_classifier(&self) -> bool {
        matches!(self.loss, Loss::CrossEntropy { .. })
    }

    fn checkpoint_path(&self, fold: usize) -> PathBuf {
        self.settings.location.file(fold, self.settings.format)
    }

    fn run_epoch(&mut self, fold: usize, epoch: usize) -> Result<f64> {
        if let Some(schedule) = &self.settings.schedule {
            let lr = schedule.learning_rate(self.settings.optimizer.learning_rate(), epoch as u64);
            for opt in &mut self.optimizers {
                opt.set_learning_rate(lr);
            }
        }
        self.network.set_training(true);

        let interval = self.settings.log_interval.max(1);
        let (mut total, mut running) = (0.0f64, 0.0f64);
        let mut batches = 0usize;
        for batch in self.inputs.train.epoch() {
            let targets = batch
                .targets
                .as_ref()
                .ok_or_else(|| TrainingError::Config("train loader has no targets".to_string()))?;
            let output = self.network.forward_train(&batch)?;
            let (loss, grad) = self.loss.compute(&output, targets)?;
            self.network.backward(&grad)?;
            for ((param, grad), opt) in self
                .network
                .params_and_grads()
                .into_iter()
                .zip(self.optimizers.iter_mut())
            {
                opt.apply_gradients(param.data_mut(), grad.data());
            }

            total += loss as f64;
            running += loss as f64;
            batches += 1;
            if batches % interval == 0 {
                info!(
                    fold,
                    epoch,
                    batch = batches,
                    loss = running / interval as f64,
                    "Training"
                );
                running = 0.0;
            }
        }
        self.network.set_training(false);
        Ok(total / batches.max(1) as f64)
    }

    /// Model outputs in storage order as a flat `[rows * output_dim]` buffer.
    fn outputs(&self, loader: &DataLoader) -> Result<Vec<f32>> {
        let mut out = Vec::with_capacity(loader.len() * self.network.output_dim());
        for batch in loader.sequential() {
            out.extend(self.network.forward(&batch)?.into_data());
        }
        Ok(out)
    }

    fn predicted_classes(&self, loader: &DataLoader) -> Result<Vec<usize>> {
        let mut classes = Vec::with_capacity(loader.len());
        for batch in loader.sequential() {
            classes.extend(self.network.forward(&batch)?.argmax_rows());
        }
        Ok(classes)
    }

    fn evaluate(&self) -> Result<Evaluation> {
        let valid = &self.inputs.valid;
        if self.is_classifier() {
            let Some(Targets::Classes(truth)) = valid.targets() else {
                return Err(TrainingError::Config(
                    "classifier validation needs class targets".to_string(),
                ));
            };
            let predicted = self.predicted_classes(valid)?;
            let as_f32 = |v: &[usize]| v.iter().map(|&c| c as f32).collect::<Vec<_>>();
            let accuracy = metrics::accuracy(truth, &predicted);
            let confusion = metrics::confusion_matrix(truth, &predicted, self.network.output_dim());
            for (class, row) in confusion.iter().enumerate() {
                let cells: Vec<String> = row.iter().map(|p| format!("{p:5.1}")).collect();
                info!(class, "confusion [{}]", cells.join(", "));
            }
            Ok(Evaluation {
                rmse: metrics::rmse(&as_f32(truth), &as_f32(&predicted)),
                accuracy: Some(accuracy),
            })
        } else {
            let predicted = self.inputs.transform.inverse_all(&self.outputs(valid)?);
            Ok(Evaluation {
                rmse: metrics::rmse(&self.inputs.valid_ratings, &predicted),
                accuracy: None,
            })
        }
    }

    fn save_best(&self, fold: usize, epoch: usize, score: f64) -> Result<()> {
        let mut state = export_state(self.network.as_ref(), fold);
        state.epoch = epoch;
        state.score = score;
        self.checkpointer.save(&self.checkpoint_path(fold), &state)?;
        Ok(())
    }

    /// Loads the fold's best checkpoint back into the network and
    /// re-scores it on the validation split.
    fn restore_best(&mut self, fold: usize) -> Result<f64> {
        let best = self.checkpointer.restore(&self.checkpoint_path(fold))?;
        load_state(self.network.as_mut(), &best)?;
        let score = self.evaluate()?.rmse;
        info!(
            fold,
            model = self.network.name(),
            best_epoch = best.epoch,
            rmse = score,
            "Restored best checkpoint"
        );
        Ok(score)
    }
}

impl ModelAdapter for NeuralAdapter {
    fn name(&self) -> &str {
        self.network.name()
    }

    fn state(&self) -> AdapterState {
        self.state
    }

    fn train(&mut self, fold: usize) -> Result<f64> {
        self.state.require(AdapterState::Constructed)?;
        self.state = AdapterState::Training;

        let mut hooks = HookList::new();
        hooks.add(LoggingHook::new(fold, 1));
        let mut early = EarlyStoppingHook::new("rmse", self.settings.patience, 0.0);
        let mut last: Option<Metrics> = None;
        let mut epochs_run = 0u64;
        let mut stopped = false;

        for epoch in 0..self.settings.epochs {
            hooks.before_epoch(epoch as u64)?;
            let loss = self.run_epoch(fold, epoch)?;
            let eval = self.evaluate()?;
            let mut epoch_metrics = Metrics::new(loss, epoch as u64).with_custom("rmse", eval.rmse);
            if let Some(acc) = eval.accuracy {
                epoch_metrics = epoch_metrics.with_accuracy(acc);
            }

            let mut action = hooks.after_epoch(epoch as u64, &epoch_metrics)?;
            if early.after_epoch(epoch as u64, &epoch_metrics)? == HookAction::Stop {
                action = HookAction::Stop;
            }
            if early.improved() {
                self.save_best(fold, epoch, eval.rmse)?;
            }
            epochs_run = epoch as u64 + 1;
            last = Some(epoch_metrics);
            if action == HookAction::Stop {
                stopped = true;
                break;
            }
        }
        hooks.end(epochs_run, last.as_ref())?;
        self.state = if stopped {
            AdapterState::EarlyStopped
        } else {
            AdapterState::Exhausted
        };
        debug!(fold, state = %self.state, "Epoch loop finished");

        let score = self.restore_best(fold)?;
        self.state = AdapterState::Ready;
        Ok(score)
    }

    fn predict(&mut self, loader: &DataLoader) -> Result<Vec<f32>> {
        self.state.require(AdapterState::Ready)?;
        if self.is_classifier() {
            Ok(self
                .predicted_classes(loader)?
                .into_iter()
                .map(|c| c as f32)
                .collect())
        } else {
            self.outputs(loader)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FmModel, NcfModel};
    use bookrec_checkpoint::CheckpointError;
    use bookrec_data::{FieldMatrix, TargetTransform};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::tempdir;

    /// Two users, two items; user 0 rates high, user 1 rates low.
    fn inputs(classes: bool) -> FoldInputs {
        let rows: Vec<u32> = (0..40u32).flat_map(|i| [i % 2, (i / 2) % 2]).collect();
        let ratings: Vec<f32> = (0..40).map(|i| if i % 2 == 0 { 9.0 } else { 2.0 }).collect();
        let targets = |r: &[f32]| {
            if classes {
                Targets::Classes(r.iter().map(|&v| if v > 5.0 { 1 } else { 0 }).collect())
            } else {
                Targets::Regression(r.to_vec())
            }
        };
        let fields = FieldMatrix::from_data(2, rows).unwrap();
        let train = DataLoader::new(fields.clone(), Some(targets(&ratings)), 8)
            .unwrap()
            .with_shuffle(1);
        let valid = DataLoader::new(fields, Some(targets(&ratings)), 8).unwrap();
        FoldInputs {
            fold: 0,
            train,
            valid,
            transform: TargetTransform::Identity,
            valid_ratings: ratings,
        }
    }

    fn settings(root: &std::path::Path, epochs: usize) -> TrainSettings {
        TrainSettings {
            epochs,
            patience: 3,
            log_interval: 2,
            optimizer: OptimizerConfig::amsgrad(0.05, 0.0),
            schedule: None,
            location: CheckpointLocation::new(root, "FM", 1, 1),
            format: CheckpointFormat::Json,
        }
    }

    #[test]
    fn test_train_restores_best_and_predicts() {
        let dir = tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let network = Box::new(FmModel::new(&[2, 2], 4, 1, &mut rng).unwrap());
        let data = inputs(false);
        let test = DataLoader::new(data.valid.fields().clone(), None, 5).unwrap();
        let mut adapter =
            NeuralAdapter::new(network, Loss::Rmse, data, settings(dir.path(), 30)).unwrap();

        assert!(matches!(
            adapter.predict(&test),
            Err(TrainingError::InvalidState { .. })
        ));
        let score = adapter.train(0).unwrap();
        assert_eq!(adapter.state(), AdapterState::Ready);
        assert!(score.is_finite());
        assert!(score < 4.0, "rmse {score} did not improve on the mean");
        assert!(dir.path().join("FM/u01_b01/fold0/checkpoint.json").exists());

        let predictions = adapter.predict(&test).unwrap();
        assert_eq!(predictions.len(), 40);
        assert!(predictions[0] > predictions[1]);

        assert!(matches!(
            adapter.train(0),
            Err(TrainingError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_classifier_predicts_class_indices() {
        let dir = tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let network = Box::new(NcfModel::new(&[2, 2], 4, &[8], 0.0, 2, &mut rng).unwrap());
        let data = inputs(true);
        let test = DataLoader::new(data.valid.fields().clone(), None, 16).unwrap();
        let loss = Loss::CrossEntropy {
            weights: vec![1.0, 1.0],
        };
        let mut adapter = NeuralAdapter::new(network, loss, data, settings(dir.path(), 5)).unwrap();
        adapter.train(2).unwrap();
        assert!(dir.path().join("FM/u01_b01/fold2/checkpoint.json").exists());
        let predictions = adapter.predict(&test).unwrap();
        assert!(predictions.iter().all(|&c| c == 0.0 || c == 1.0));
    }

    fn fm_adapter(root: &std::path::Path, epochs: usize) -> NeuralAdapter {
        let mut rng = StdRng::seed_from_u64(0);
        let network = Box::new(FmModel::new(&[2, 2], 4, 1, &mut rng).unwrap());
        NeuralAdapter::new(network, Loss::Rmse, inputs(false), settings(root, epochs)).unwrap()
    }

    #[test]
    fn test_no_epochs_leaves_nothing_to_restore() {
        let dir = tempdir().unwrap();
        let mut adapter = fm_adapter(dir.path(), 0);
        let err = adapter.train(0).unwrap_err();
        assert!(matches!(
            err,
            TrainingError::Checkpoint(CheckpointError::NotFound(ref path))
                if path.ends_with("FM/u01_b01/fold0/checkpoint.json")
        ));
        assert_ne!(adapter.state(), AdapterState::Ready);
    }

    #[test]
    fn test_restore_after_checkpoint_removed() {
        let dir = tempdir().unwrap();
        let mut adapter = fm_adapter(dir.path(), 3);
        adapter.train(1).unwrap();
        let path = dir.path().join("FM/u01_b01/fold1/checkpoint.json");
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(
            adapter.restore_best(1),
            Err(TrainingError::Checkpoint(CheckpointError::NotFound(ref p))) if *p == path
        ));
    }
}
