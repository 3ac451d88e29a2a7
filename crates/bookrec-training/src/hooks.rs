//! Epoch hooks for the training loop.
//!
//! Hooks run after every epoch with that epoch's [`Metrics`]. A hook may
//! ask the loop to stop; early stopping is the usual reason.

use crate::metrics::Metrics;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur during hook execution.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Hook error: {0}")]
    Custom(String),

    /// A monitored metric came back NaN or infinite.
    #[error("{metric} is {value} at epoch {epoch}")]
    NonFinite {
        metric: String,
        epoch: u64,
        value: f64,
    },
}

pub type HookResult<T> = Result<T, HookError>;

/// Action to take after a hook runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookAction {
    Continue,
    Stop,
}

/// Trait for training hooks.
///
/// # Examples
///
/// ```
/// use bookrec_training::hooks::{Hook, HookAction, HookResult};
/// use bookrec_training::metrics::Metrics;
///
/// struct StopAtFive;
///
/// impl Hook for StopAtFive {
///     fn name(&self) -> &str {
///         "stop_at_five"
///     }
///
///     fn after_epoch(&mut self, epoch: u64, _metrics: &Metrics) -> HookResult<HookAction> {
///         Ok(if epoch >= 5 { HookAction::Stop } else { HookAction::Continue })
///     }
/// }
/// ```
pub trait Hook: Send + Sync {
    fn name(&self) -> &str;

    /// Called before each epoch.
    fn before_epoch(&mut self, _epoch: u64) -> HookResult<()> {
        Ok(())
    }

    /// Called after each epoch with its training and validation metrics.
    fn after_epoch(&mut self, _epoch: u64, _metrics: &Metrics) -> HookResult<HookAction> {
        Ok(HookAction::Continue)
    }

    /// Called once when the epoch loop ends.
    fn end(&mut self, _epoch: u64, _metrics: Option<&Metrics>) -> HookResult<()> {
        Ok(())
    }
}

/// Logs epoch metrics every `every_n_epochs` epochs.
#[derive(Debug)]
pub struct LoggingHook {
    fold: usize,
    every_n_epochs: u64,
}

impl LoggingHook {
    pub fn new(fold: usize, every_n_epochs: u64) -> Self {
        Self {
            fold,
            every_n_epochs: every_n_epochs.max(1),
        }
    }
}

impl Hook for LoggingHook {
    fn name(&self) -> &str {
        "logging_hook"
    }

    fn after_epoch(&mut self, epoch: u64, metrics: &Metrics) -> HookResult<HookAction> {
        if epoch % self.every_n_epochs == 0 {
            let mut msg = format!("train loss = {:.6}", metrics.loss);
            if let Some(acc) = metrics.accuracy {
                msg.push_str(&format!(", accuracy = {acc:.4}"));
            }
            let mut custom: Vec<_> = metrics.custom.iter().collect();
            custom.sort_by(|a, b| a.0.cmp(b.0));
            for (name, value) in custom {
                msg.push_str(&format!(", {name} = {value:.4}"));
            }
            info!(fold = self.fold, epoch, "{}", msg);
        }
        Ok(HookAction::Continue)
    }

    fn end(&mut self, epoch: u64, metrics: Option<&Metrics>) -> HookResult<()> {
        match metrics {
            Some(m) => info!(fold = self.fold, epoch, loss = m.loss, "Training finished"),
            None => info!(fold = self.fold, epoch, "Training finished"),
        }
        Ok(())
    }
}

/// Stops training once a monitored metric stops improving.
///
/// # Examples
///
/// ```
/// use bookrec_training::hooks::{EarlyStoppingHook, Hook, HookAction};
/// use bookrec_training::metrics::Metrics;
///
/// let mut hook = EarlyStoppingHook::new("rmse", 1, 0.0);
/// let m = |v: f64, e: u64| Metrics::new(0.0, e).with_custom("rmse", v);
/// assert_eq!(hook.after_epoch(0, &m(2.0, 0)).unwrap(), HookAction::Continue);
/// assert!(hook.improved());
/// assert_eq!(hook.after_epoch(1, &m(2.5, 1)).unwrap(), HookAction::Stop);
/// assert_eq!(hook.best_value(), Some(2.0));
/// ```
#[derive(Debug)]
pub struct EarlyStoppingHook {
    metric_name: String,
    /// Epochs with no improvement before stopping.
    patience: u64,
    /// Minimum change to qualify as an improvement.
    min_delta: f64,
    lower_is_better: bool,
    best_value: Option<f64>,
    best_epoch: u64,
    epochs_without_improvement: u64,
    improved: bool,
}

impl EarlyStoppingHook {
    /// `loss`, `rmse` and any other custom error metric are minimized;
    /// `accuracy` is maximized.
    pub fn new(metric_name: impl Into<String>, patience: u64, min_delta: f64) -> Self {
        let metric_name = metric_name.into();
        let lower_is_better = metric_name != "accuracy";
        Self {
            metric_name,
            patience: patience.max(1),
            min_delta,
            lower_is_better,
            best_value: None,
            best_epoch: 0,
            epochs_without_improvement: 0,
            improved: false,
        }
    }

    pub fn best_value(&self) -> Option<f64> {
        self.best_value
    }

    pub fn best_epoch(&self) -> u64 {
        self.best_epoch
    }

    /// Whether the most recent epoch set a new best.
    pub fn improved(&self) -> bool {
        self.improved
    }

    fn metric_value(&self, metrics: &Metrics) -> Option<f64> {
        match self.metric_name.as_str() {
            "loss" => Some(metrics.loss),
            "accuracy" => metrics.accuracy,
            name => metrics.custom.get(name).copied(),
        }
    }

    fn is_improvement(&self, current: f64) -> bool {
        match self.best_value {
            None => true,
            Some(best) => {
                if self.lower_is_better {
                    current < best - self.min_delta
                } else {
                    current > best + self.min_delta
                }
            }
        }
    }
}

impl Hook for EarlyStoppingHook {
    fn name(&self) -> &str {
        "early_stopping_hook"
    }

    fn after_epoch(&mut self, epoch: u64, metrics: &Metrics) -> HookResult<HookAction> {
        self.improved = false;
        let Some(current) = self.metric_value(metrics) else {
            warn!(metric = %self.metric_name, "Early stopping metric missing");
            return Ok(HookAction::Continue);
        };
        if !current.is_finite() {
            return Err(HookError::NonFinite {
                metric: self.metric_name.clone(),
                epoch,
                value: current,
            });
        }

        if self.is_improvement(current) {
            debug!(
                metric = %self.metric_name,
                previous = ?self.best_value,
                current,
                epoch,
                "Validation improved"
            );
            self.best_value = Some(current);
            self.best_epoch = epoch;
            self.epochs_without_improvement = 0;
            self.improved = true;
        } else {
            self.epochs_without_improvement += 1;
            debug!(
                without_improvement = self.epochs_without_improvement,
                patience = self.patience,
                "No improvement"
            );
            if self.epochs_without_improvement >= self.patience {
                info!(
                    epoch,
                    best_epoch = self.best_epoch,
                    "Stopping early: no improvement for {} epochs",
                    self.patience
                );
                return Ok(HookAction::Stop);
            }
        }
        Ok(HookAction::Continue)
    }
}

/// A collection of hooks that are run together.
#[derive(Default)]
pub struct HookList {
    hooks: Vec<Box<dyn Hook>>,
}

impl HookList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<H: Hook + 'static>(&mut self, hook: H) {
        self.hooks.push(Box::new(hook));
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn before_epoch(&mut self, epoch: u64) -> HookResult<()> {
        for hook in &mut self.hooks {
            hook.before_epoch(epoch)?;
        }
        Ok(())
    }

    /// Runs every hook; returns `Stop` if any hook requested it.
    pub fn after_epoch(&mut self, epoch: u64, metrics: &Metrics) -> HookResult<HookAction> {
        let mut action = HookAction::Continue;
        for hook in &mut self.hooks {
            if hook.after_epoch(epoch, metrics)? == HookAction::Stop {
                action = HookAction::Stop;
            }
        }
        Ok(action)
    }

    pub fn end(&mut self, epoch: u64, metrics: Option<&Metrics>) -> HookResult<()> {
        for hook in &mut self.hooks {
            hook.end(epoch, metrics)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rmse(value: f64, epoch: u64) -> Metrics {
        Metrics::new(0.5, epoch).with_custom("rmse", value)
    }

    #[test]
    fn test_logging_hook() {
        let mut hook = LoggingHook::new(0, 2);
        assert!(hook.before_epoch(0).is_ok());
        assert_eq!(hook.after_epoch(0, &rmse(1.0, 0)).unwrap(), HookAction::Continue);
        assert_eq!(hook.after_epoch(1, &rmse(1.0, 1)).unwrap(), HookAction::Continue);
        assert!(hook.end(2, None).is_ok());
    }

    #[test]
    fn test_early_stopping_improvement() {
        let mut hook = EarlyStoppingHook::new("rmse", 3, 0.01);
        hook.after_epoch(0, &rmse(2.0, 0)).unwrap();
        assert_eq!(hook.best_value(), Some(2.0));
        assert!(hook.improved());

        hook.after_epoch(1, &rmse(1.5, 1)).unwrap();
        assert_eq!(hook.best_value(), Some(1.5));
        assert_eq!(hook.best_epoch(), 1);
        assert_eq!(hook.epochs_without_improvement, 0);

        // within min_delta does not count
        hook.after_epoch(2, &rmse(1.495, 2)).unwrap();
        assert!(!hook.improved());
        assert_eq!(hook.best_value(), Some(1.5));
    }

    #[test]
    fn test_early_stopping_stop() {
        let mut hook = EarlyStoppingHook::new("rmse", 3, 0.0);
        hook.after_epoch(0, &rmse(1.0, 0)).unwrap();
        assert_eq!(hook.after_epoch(1, &rmse(1.0, 1)).unwrap(), HookAction::Continue);
        assert_eq!(hook.after_epoch(2, &rmse(1.2, 2)).unwrap(), HookAction::Continue);
        assert_eq!(hook.after_epoch(3, &rmse(1.1, 3)).unwrap(), HookAction::Stop);
        assert_eq!(hook.best_epoch(), 0);
    }

    #[test]
    fn test_accuracy_is_maximized() {
        let mut hook = EarlyStoppingHook::new("accuracy", 1, 0.0);
        hook.after_epoch(0, &Metrics::new(0.0, 0).with_accuracy(0.4)).unwrap();
        hook.after_epoch(1, &Metrics::new(0.0, 1).with_accuracy(0.6)).unwrap();
        assert!(hook.improved());
        assert_eq!(hook.best_value(), Some(0.6));
    }

    #[test]
    fn test_missing_metric_continues() {
        let mut hook = EarlyStoppingHook::new("rmse", 1, 0.0);
        let action = hook.after_epoch(0, &Metrics::new(1.0, 0)).unwrap();
        assert_eq!(action, HookAction::Continue);
        assert_eq!(hook.best_value(), None);
    }

    #[test]
    fn test_non_finite_metric_is_rejected() {
        let mut hook = EarlyStoppingHook::new("rmse", 3, 0.0);
        hook.after_epoch(0, &rmse(1.0, 0)).unwrap();
        let err = hook.after_epoch(1, &rmse(f64::NAN, 1)).unwrap_err();
        assert!(matches!(
            err,
            HookError::NonFinite { ref metric, epoch: 1, value }
                if metric == "rmse" && value.is_nan()
        ));
        assert!(!hook.improved());
        assert_eq!(hook.best_value(), Some(1.0));

        let mut fresh = EarlyStoppingHook::new("rmse", 3, 0.0);
        assert!(fresh.after_epoch(0, &rmse(f64::INFINITY, 0)).is_err());
        assert_eq!(fresh.best_value(), None);
    }

    #[test]
    fn test_hook_list() {
        let mut hooks = HookList::new();
        hooks.add(LoggingHook::new(0, 1));
        hooks.add(EarlyStoppingHook::new("rmse", 1, 0.0));
        assert_eq!(hooks.len(), 2);

        assert!(hooks.before_epoch(0).is_ok());
        assert_eq!(hooks.after_epoch(0, &rmse(1.0, 0)).unwrap(), HookAction::Continue);
        assert_eq!(hooks.after_epoch(1, &rmse(1.0, 1)).unwrap(), HookAction::Stop);
        assert!(hooks.end(1, Some(&rmse(1.0, 1))).is_ok());
    }
}
