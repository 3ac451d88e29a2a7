//! Data preparation for the book rating models.
//!
//! The pipeline runs in one direction:
//!
//! 1. [`table`] reads the user, book and rating CSVs and validates their columns.
//! 2. [`encoder`] joins ratings with attributes, builds [`IdIndex`]es once,
//!    and encodes every row into a field vector with matching `field_dims`.
//! 3. [`split`] produces a random split or stratified k-fold partitions.
//! 4. [`loader::assemble`] slices a fold, maps ratings into targets
//!    ([`scaler`], [`label`]) and wraps rows into batched [`DataLoader`]s.
//!
//! # Example
//!
//! ```
//! use bookrec_data::{IdIndex, RatingRanges, StratifiedKFold};
//!
//! let users = IdIndex::from_values("user_id", ["u7", "u3", "u7"]);
//! assert_eq!(users.len(), 2);
//!
//! let ranges: RatingRanges = "1-4,5-7,8-10".parse().unwrap();
//! assert_eq!(ranges.class_of(6.0).unwrap(), 1);
//!
//! let labels: Vec<f32> = (0..20).map(|i| (i % 10 + 1) as f32).collect();
//! let folds = StratifiedKFold::new(4, 42).split(&labels).unwrap();
//! assert_eq!(folds.len(), 4);
//! ```

pub mod bucket;
pub mod encoder;
pub mod error;
pub mod index;
pub mod label;
pub mod loader;
pub mod scaler;
pub mod side;
pub mod split;
pub mod table;

pub use encoder::{
    ContextColumn, EncodedDataset, FeatureEncoder, FeatureSchema, FieldMatrix, JoinedRow,
};
pub use error::{DataError, Result};
pub use index::IdIndex;
pub use label::{RatingRange, RatingRanges};
pub use loader::{assemble, Batch, DataLoader, FoldData, LoaderConfig, TargetMode, Targets};
pub use scaler::{StandardScaler, TargetTransform};
pub use side::{DenseFeatures, SideTable};
pub use split::{random_split, FoldIndices, StratifiedKFold, Validation};
pub use table::{DataPaths, RatingRow, RawData, Table};
