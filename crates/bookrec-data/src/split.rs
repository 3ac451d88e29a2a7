//! Train/validation partitioning: one seeded random split, or stratified
//! k-fold over the rating label.

use crate::error::{DataError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Row indices of one train/validation partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldIndices {
    pub fold: usize,
    pub train: Vec<usize>,
    pub valid: Vec<usize>,
}

/// Validation strategy of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validation {
    /// A single shuffled split with `test_size` of the rows held out.
    Random { test_size: f64 },
    /// Stratified k-fold with `n_splits` folds.
    KFold { n_splits: usize },
}

impl Validation {
    pub fn folds(&self, labels: &[f32], seed: u64) -> Result<Vec<FoldIndices>> {
        let folds = match *self {
            Validation::Random { test_size } => vec![random_split(labels.len(), test_size, seed)?],
            Validation::KFold { n_splits } => StratifiedKFold::new(n_splits, seed).split(labels)?,
        };
        info!(
            folds = folds.len(),
            rows = labels.len(),
            "Prepared validation folds"
        );
        Ok(folds)
    }
}

/// Shuffles `0..n` with `seed` and holds out the first `ceil(n * test_size)`.
pub fn random_split(n: usize, test_size: f64, seed: u64) -> Result<FoldIndices> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(DataError::InvalidSplit(format!(
            "test_size must be in (0, 1), got {test_size}"
        )));
    }
    let n_valid = (n as f64 * test_size).ceil() as usize;
    if n_valid == 0 || n_valid >= n {
        return Err(DataError::InvalidSplit(format!(
            "test_size {test_size} leaves an empty side with {n} rows"
        )));
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    let train = order.split_off(n_valid);
    Ok(FoldIndices {
        fold: 0,
        train,
        valid: order,
    })
}

/// Stratified k-fold over rounded labels.
///
/// Rows are grouped by their rounded label, shuffled within each group,
/// and dealt to folds round-robin with one counter running across groups,
/// so every fold receives a near-equal share of each label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StratifiedKFold {
    n_splits: usize,
    seed: u64,
    shuffle: bool,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        Self {
            n_splits,
            seed,
            shuffle: true,
        }
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    pub fn split(&self, labels: &[f32]) -> Result<Vec<FoldIndices>> {
        let n = labels.len();
        if self.n_splits < 2 {
            return Err(DataError::InvalidSplit(format!(
                "n_splits must be at least 2, got {}",
                self.n_splits
            )));
        }
        if self.n_splits > n {
            return Err(DataError::InvalidSplit(format!(
                "n_splits {} exceeds the number of rows {n}",
                self.n_splits
            )));
        }

        let mut classes: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (i, &label) in labels.iter().enumerate() {
            classes.entry(label.round() as i64).or_default().push(i);
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut assignment = vec![0usize; n];
        let mut counter = 0usize;
        for (label, rows) in classes.iter_mut() {
            if rows.len() < self.n_splits {
                warn!(
                    label,
                    members = rows.len(),
                    n_splits = self.n_splits,
                    "Label has fewer members than folds"
                );
            }
            if self.shuffle {
                rows.shuffle(&mut rng);
            }
            for &row in rows.iter() {
                assignment[row] = counter % self.n_splits;
                counter += 1;
            }
        }

        Ok((0..self.n_splits)
            .map(|fold| {
                let (valid, train): (Vec<usize>, Vec<usize>) =
                    (0..n).partition(|&i| assignment[i] == fold);
                FoldIndices { fold, train, valid }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n: usize) -> Vec<f32> {
        (0..n).map(|i| (i % 10 + 1) as f32).collect()
    }

    #[test]
    fn test_kfold_partitions_rows() {
        for k in [2, 3, 5, 7] {
            let folds = StratifiedKFold::new(k, 42).split(&labels(53)).unwrap();
            assert_eq!(folds.len(), k);
            let mut seen = vec![0usize; 53];
            for fold in &folds {
                assert_eq!(fold.train.len() + fold.valid.len(), 53);
                for &i in &fold.valid {
                    seen[i] += 1;
                    assert!(!fold.train.contains(&i));
                }
            }
            assert!(seen.iter().all(|&c| c == 1));
        }
    }

    #[test]
    fn test_kfold_is_stratified() {
        let y = labels(100);
        let folds = StratifiedKFold::new(5, 1).split(&y).unwrap();
        for fold in &folds {
            assert_eq!(fold.valid.len(), 20);
            for class in 1..=10 {
                let count = fold.valid.iter().filter(|&&i| y[i] == class as f32).count();
                assert_eq!(count, 2);
            }
        }
    }

    #[test]
    fn test_kfold_is_seeded() {
        let y = labels(40);
        let a = StratifiedKFold::new(4, 9).split(&y).unwrap();
        let b = StratifiedKFold::new(4, 9).split(&y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_kfold_rejects_bad_counts() {
        assert!(matches!(
            StratifiedKFold::new(1, 0).split(&labels(10)),
            Err(DataError::InvalidSplit(_))
        ));
        assert!(StratifiedKFold::new(11, 0).split(&labels(10)).is_err());
    }

    #[test]
    fn test_random_split_sizes() {
        let split = random_split(10, 0.2, 42).unwrap();
        assert_eq!(split.valid.len(), 2);
        assert_eq!(split.train.len(), 8);
        let mut all: Vec<usize> = split.train.iter().chain(&split.valid).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
        assert_eq!(split, random_split(10, 0.2, 42).unwrap());
        assert!(random_split(10, 1.5, 0).is_err());
        assert!(random_split(1, 0.5, 0).is_err());
    }

    #[test]
    fn test_validation_modes() {
        let y = labels(30);
        assert_eq!(Validation::Random { test_size: 0.3 }.folds(&y, 0).unwrap().len(), 1);
        assert_eq!(Validation::KFold { n_splits: 3 }.folds(&y, 0).unwrap().len(), 3);
    }
}
