//! Error types for data loading and preparation.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading, encoding, splitting or batching rating data.
#[derive(Debug, Error)]
pub enum DataError {
    /// I/O error while opening an input file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed delimited input.
    #[error("CSV error in {file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },

    /// An input file lacks a column the pipeline needs.
    #[error("{file} is missing required column '{column}'")]
    MissingColumn { file: String, column: String },

    /// A cell could not be parsed as the expected type.
    #[error("invalid value '{value}' in column '{column}' of {file}")]
    Parse {
        file: String,
        column: String,
        value: String,
    },

    /// A categorical value has no entry in its index.
    #[error("unknown value '{value}' for field '{field}'")]
    UnknownValue { field: String, value: String },

    /// The target cannot be standardized.
    #[error("cannot scale targets: {len} values with standard deviation {std}")]
    DegenerateTarget { len: usize, std: f64 },

    /// A rating falls outside every configured classification range.
    #[error("rating {rating} is outside the configured label ranges")]
    LabelOutOfRange { rating: f32 },

    /// Classification or filter ranges could not be parsed.
    #[error("invalid rating ranges: {0}")]
    InvalidRanges(String),

    /// Split parameters are inconsistent with the data.
    #[error("invalid split: {0}")]
    InvalidSplit(String),

    /// Batches must hold at least one row.
    #[error("batch size must be positive")]
    InvalidBatchSize,

    /// Two buffers that must be aligned have different lengths.
    #[error("length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;
