//! Training metrics and validation scores.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metrics collected for one epoch or evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metrics {
    /// Mean training loss.
    pub loss: f64,
    /// Classification accuracy (0.0 to 1.0).
    pub accuracy: Option<f64>,
    /// Custom metrics with string keys.
    pub custom: HashMap<String, f64>,
    /// The epoch at which these metrics were recorded.
    pub global_step: u64,
}

impl Metrics {
    /// Creates a new `Metrics` instance with the given loss and step.
    ///
    /// # Examples
    ///
    /// ```
    /// use bookrec_training::metrics::Metrics;
    ///
    /// let metrics = Metrics::new(0.5, 3).with_custom("rmse", 2.2);
    /// assert_eq!(metrics.loss, 0.5);
    /// assert_eq!(metrics.custom["rmse"], 2.2);
    /// ```
    pub fn new(loss: f64, global_step: u64) -> Self {
        Self {
            loss,
            accuracy: None,
            custom: HashMap::new(),
            global_step,
        }
    }

    /// Sets the accuracy metric.
    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    /// Adds a custom metric.
    pub fn with_custom(mut self, name: impl Into<String>, value: f64) -> Self {
        self.custom.insert(name.into(), value);
        self
    }
}

/// Root mean squared error between two aligned sequences.
pub fn rmse(targets: &[f32], predictions: &[f32]) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    let se: f64 = targets
        .iter()
        .zip(predictions)
        .map(|(&t, &p)| (t as f64 - p as f64).powi(2))
        .sum();
    (se / targets.len() as f64).sqrt()
}

/// Fraction of positions where the classes agree.
pub fn accuracy(targets: &[usize], predictions: &[usize]) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    let hits = targets
        .iter()
        .zip(predictions)
        .filter(|(t, p)| t == p)
        .count();
    hits as f64 / targets.len() as f64
}

/// Confusion matrix normalized per true class, in percent.
/// Row = true class, column = predicted class.
pub fn confusion_matrix(targets: &[usize], predictions: &[usize], classes: usize) -> Vec<Vec<f64>> {
    let mut counts = vec![vec![0usize; classes]; classes];
    for (&t, &p) in targets.iter().zip(predictions) {
        if t < classes && p < classes {
            counts[t][p] += 1;
        }
    }
    counts
        .into_iter()
        .map(|row| {
            let total: usize = row.iter().sum();
            row.into_iter()
                .map(|c| {
                    if total == 0 {
                        0.0
                    } else {
                        100.0 * c as f64 / total as f64
                    }
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rmse() {
        assert_eq!(rmse(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
        assert!((rmse(&[0.0, 0.0], &[3.0, 4.0]) - 12.5f64.sqrt()).abs() < 1e-12);
        assert_eq!(rmse(&[], &[]), 0.0);
    }

    #[test]
    fn test_accuracy_and_confusion() {
        let t = [0, 0, 1, 2, 2, 2];
        let p = [0, 1, 1, 2, 2, 0];
        assert!((accuracy(&t, &p) - 4.0 / 6.0).abs() < 1e-12);
        let cm = confusion_matrix(&t, &p, 3);
        assert_eq!(cm[0], vec![50.0, 50.0, 0.0]);
        assert_eq!(cm[1], vec![0.0, 100.0, 0.0]);
        assert!((cm[2][2] - 200.0 / 3.0).abs() < 1e-9);
    }
}
