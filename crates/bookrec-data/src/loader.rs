//! Batched loaders and per-fold assembly.
//!
//! [`assemble`] slices the encoded training set by a fold's indices, maps
//! ratings into model targets, and wraps train, validation and test rows
//! into [`DataLoader`]s. Shared inputs (the encoded matrices and side
//! tables) are read, never modified.

use crate::encoder::{EncodedDataset, FieldMatrix};
use crate::error::{DataError, Result};
use crate::label::{RatingRange, RatingRanges};
use crate::scaler::{StandardScaler, TargetTransform};
use crate::side::DenseFeatures;
use crate::split::FoldIndices;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info};

/// Per-row training targets.
#[derive(Debug, Clone, PartialEq)]
pub enum Targets {
    Regression(Vec<f32>),
    Classes(Vec<usize>),
}

impl Targets {
    pub fn len(&self) -> usize {
        match self {
            Targets::Regression(v) => v.len(),
            Targets::Classes(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn select(&self, rows: &[usize]) -> Targets {
        match self {
            Targets::Regression(v) => Targets::Regression(rows.iter().map(|&r| v[r]).collect()),
            Targets::Classes(v) => Targets::Classes(rows.iter().map(|&r| v[r]).collect()),
        }
    }
}

/// One mini-batch: `rows * num_fields` codes, `rows * dense_dim` dense
/// values, and targets when the source has them.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub fields: Vec<u32>,
    pub num_fields: usize,
    pub dense: Vec<f32>,
    pub dense_dim: usize,
    pub targets: Option<Targets>,
}

impl Batch {
    pub fn rows(&self) -> usize {
        self.fields.len() / self.num_fields.max(1)
    }
}

/// Batched view over a field matrix with optional dense inputs and targets.
#[derive(Debug, Clone)]
pub struct DataLoader {
    fields: FieldMatrix,
    dense: DenseFeatures,
    targets: Option<Targets>,
    batch_size: usize,
    shuffle: bool,
    rng: StdRng,
}

impl DataLoader {
    pub fn new(fields: FieldMatrix, targets: Option<Targets>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(DataError::InvalidBatchSize);
        }
        if let Some(t) = &targets {
            if t.len() != fields.rows() {
                return Err(DataError::LengthMismatch {
                    expected: fields.rows(),
                    actual: t.len(),
                });
            }
        }
        Ok(Self {
            fields,
            dense: DenseFeatures::new(),
            targets,
            batch_size,
            shuffle: false,
            rng: StdRng::seed_from_u64(0),
        })
    }

    pub fn with_dense(mut self, dense: DenseFeatures) -> Self {
        self.dense = dense;
        self
    }

    /// Reorders rows every [`DataLoader::epoch`] using an RNG seeded with `seed`.
    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.shuffle = true;
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn len(&self) -> usize {
        self.fields.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_batches(&self) -> usize {
        self.len().div_ceil(self.batch_size)
    }

    pub fn fields(&self) -> &FieldMatrix {
        &self.fields
    }

    pub fn targets(&self) -> Option<&Targets> {
        self.targets.as_ref()
    }

    pub fn dense_dim(&self) -> usize {
        self.dense.dim()
    }

    /// Batches for one training pass, shuffled when enabled.
    pub fn epoch(&mut self) -> Batches<'_> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        if self.shuffle {
            order.shuffle(&mut self.rng);
        }
        Batches {
            loader: self,
            order,
            pos: 0,
        }
    }

    /// Batches in storage order; predictions line up with row order.
    pub fn sequential(&self) -> Batches<'_> {
        Batches {
            loader: self,
            order: (0..self.len()).collect(),
            pos: 0,
        }
    }

    fn batch(&self, rows: &[usize]) -> Batch {
        let num_fields = self.fields.num_fields();
        let dense_dim = self.dense.dim();
        let mut fields = Vec::with_capacity(rows.len() * num_fields);
        let mut dense = Vec::with_capacity(rows.len() * dense_dim);
        for &r in rows {
            let row = self.fields.row(r);
            fields.extend_from_slice(row);
            self.dense.extend_row(row, &mut dense);
        }
        Batch {
            fields,
            num_fields,
            dense,
            dense_dim,
            targets: self.targets.as_ref().map(|t| t.select(rows)),
        }
    }
}

/// Iterator over the batches of one pass.
pub struct Batches<'a> {
    loader: &'a DataLoader,
    order: Vec<usize>,
    pos: usize,
}

impl Iterator for Batches<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.pos >= self.order.len() {
            return None;
        }
        let end = (self.pos + self.loader.batch_size).min(self.order.len());
        let batch = self.loader.batch(&self.order[self.pos..end]);
        self.pos = end;
        Some(batch)
    }
}

/// How ratings become training targets.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetMode {
    Regression {
        /// Divide ratings by ten.
        zero_one: bool,
        /// Standardize with the fold's training mean and std.
        standardize: bool,
        /// Keep only train/valid rows whose rating lies in this range.
        window: Option<RatingRange>,
    },
    Classification { ranges: RatingRanges },
}

impl Default for TargetMode {
    fn default() -> Self {
        TargetMode::Regression {
            zero_one: false,
            standardize: false,
            window: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    pub batch_size: usize,
    pub shuffle: bool,
    pub seed: u64,
}

/// Loaders and target mapping for one fold.
#[derive(Debug, Clone)]
pub struct FoldData {
    pub fold: usize,
    pub train: DataLoader,
    pub valid: DataLoader,
    pub test: DataLoader,
    pub transform: TargetTransform,
    /// Validation ratings on the original scale, in `valid` storage order.
    pub valid_ratings: Vec<f32>,
}

/// Builds the train, validation and test loaders of `fold`.
pub fn assemble(
    dataset: &EncodedDataset,
    fold: &FoldIndices,
    mode: &TargetMode,
    dense: &DenseFeatures,
    config: &LoaderConfig,
) -> Result<FoldData> {
    let ratings = &dataset.ratings;
    let (train_rows, valid_rows) = match mode {
        TargetMode::Regression {
            window: Some(window),
            ..
        } => {
            let keep = |rows: &[usize]| -> Vec<usize> {
                rows.iter()
                    .copied()
                    .filter(|&r| window.contains(ratings[r]))
                    .collect()
            };
            (keep(&fold.train), keep(&fold.valid))
        }
        _ => (fold.train.clone(), fold.valid.clone()),
    };
    if train_rows.is_empty() || valid_rows.is_empty() {
        return Err(DataError::InvalidSplit(format!(
            "fold {} has {} train and {} valid rows",
            fold.fold,
            train_rows.len(),
            valid_rows.len()
        )));
    }

    let train_ratings: Vec<f32> = train_rows.iter().map(|&r| ratings[r]).collect();
    let valid_ratings: Vec<f32> = valid_rows.iter().map(|&r| ratings[r]).collect();

    let (transform, train_targets, valid_targets) = match mode {
        TargetMode::Classification { ranges } => (
            TargetTransform::Identity,
            Targets::Classes(ranges.classes_of(&train_ratings)?),
            Targets::Classes(ranges.classes_of(&valid_ratings)?),
        ),
        TargetMode::Regression {
            zero_one,
            standardize,
            ..
        } => {
            let transform = if *standardize {
                TargetTransform::Standard(StandardScaler::fit(&train_ratings)?)
            } else if *zero_one {
                TargetTransform::ZeroOne
            } else {
                TargetTransform::Identity
            };
            (
                transform,
                Targets::Regression(transform.forward_all(&train_ratings)),
                Targets::Regression(transform.forward_all(&valid_ratings)),
            )
        }
    };
    if let TargetTransform::Standard(s) = &transform {
        debug!(fold = fold.fold, mean = s.mean(), std = s.std(), "Fitted target scaler");
    }

    let make = |fields: FieldMatrix, targets: Option<Targets>| -> Result<DataLoader> {
        Ok(DataLoader::new(fields, targets, config.batch_size)?.with_dense(dense.clone()))
    };
    let mut train = make(dataset.train.select(&train_rows), Some(train_targets))?;
    let mut valid = make(dataset.train.select(&valid_rows), Some(valid_targets))?;
    if config.shuffle {
        train = train.with_shuffle(config.seed.wrapping_add(fold.fold as u64));
        valid = valid.with_shuffle(config.seed.wrapping_add(fold.fold as u64 + 1));
    }
    let test = make(dataset.test.clone(), None)?;

    info!(
        fold = fold.fold,
        train = train.len(),
        valid = valid.len(),
        test = test.len(),
        "Assembled loaders"
    );
    Ok(FoldData {
        fold: fold.fold,
        train,
        valid,
        test,
        transform,
        valid_ratings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader(rows: usize, batch: usize) -> DataLoader {
        let fields = FieldMatrix::from_data(2, (0..rows as u32 * 2).collect()).unwrap();
        let targets = Targets::Regression((0..rows).map(|r| r as f32).collect());
        DataLoader::new(fields, Some(targets), batch).unwrap()
    }

    #[test]
    fn test_batches_cover_rows_in_order() {
        let l = loader(7, 3);
        assert_eq!(l.num_batches(), 3);
        let sizes: Vec<usize> = l.sequential().map(|b| b.rows()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        let last = l.sequential().last().unwrap();
        assert_eq!(last.fields, vec![12, 13]);
        assert_eq!(last.targets, Some(Targets::Regression(vec![6.0])));
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let mut l = loader(20, 6).with_shuffle(3);
        let mut seen: Vec<u32> = l.epoch().flat_map(|b| b.fields.into_iter().step_by(2)).collect();
        assert_ne!(seen, (0..20).map(|r| r * 2).collect::<Vec<u32>>());
        seen.sort_unstable();
        assert_eq!(seen, (0..20).map(|r| r * 2).collect::<Vec<u32>>());
    }

    #[test]
    fn test_rejects_misaligned_targets() {
        let fields = FieldMatrix::from_data(1, vec![0, 1]).unwrap();
        assert!(matches!(
            DataLoader::new(fields.clone(), Some(Targets::Classes(vec![0])), 4),
            Err(DataError::LengthMismatch { .. })
        ));
        assert!(matches!(
            DataLoader::new(fields, None, 0),
            Err(DataError::InvalidBatchSize)
        ));
    }
}
