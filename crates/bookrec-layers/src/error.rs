//! Error types for the bookrec-layers crate.

use thiserror::Error;

/// Error type for layer operations.
#[derive(Debug, Error)]
pub enum LayerError {
    /// Shape mismatch between expected and actual tensor shapes.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// The expected shape
        expected: Vec<usize>,
        /// The actual shape that was provided
        actual: Vec<usize>,
    },

    /// Invalid input dimension for the layer.
    #[error("Invalid input dimension: expected {expected}, got {actual}")]
    InvalidInputDimension {
        /// The expected input dimension
        expected: usize,
        /// The actual input dimension
        actual: usize,
    },

    /// Layer has not been run in training mode before backward.
    #[error("Layer not initialized: forward_train must be called before backward")]
    NotInitialized,

    /// Configuration error for the layer.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// A field index fell outside its embedding table.
    #[error("Embedding lookup error: field {field} index {index} >= {cardinality}")]
    IndexOutOfRange {
        /// Position of the field in the field vector
        field: usize,
        /// Offending encoded value
        index: u32,
        /// Cardinality of the field
        cardinality: usize,
    },
}

/// Result type alias for layer operations.
pub type LayerResult<T> = Result<T, LayerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LayerError::ShapeMismatch {
            expected: vec![32, 64],
            actual: vec![32, 128],
        };
        assert!(err.to_string().contains("Shape mismatch"));

        let err = LayerError::IndexOutOfRange {
            field: 2,
            index: 9,
            cardinality: 6,
        };
        assert!(err.to_string().contains("field 2 index 9 >= 6"));

        let err = LayerError::NotInitialized;
        assert!(err.to_string().contains("not initialized"));
    }
}
