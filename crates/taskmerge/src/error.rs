//! Error types for task tensor merging.

use thiserror::Error;

/// Errors that can occur while merging task tensors.
#[derive(Debug, Error)]
pub enum MergeError {
    /// An argument is outside its valid domain (negative density, rank overflow, ...).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A method name that does not name any known strategy or sub-method.
    #[error("Unknown {kind} method: {name:?}")]
    UnknownMethod {
        /// Which family of method was being parsed.
        kind: &'static str,
        /// The rejected name.
        name: String,
    },

    /// Not enough task tensors for the merge.
    #[error("Expected at least {expected} task tensors, got {actual}")]
    NotEnoughModels {
        /// Minimum number of task tensors.
        expected: usize,
        /// Number actually supplied.
        actual: usize,
    },

    /// Weight vector length does not match the number of task tensors.
    #[error("Expected {expected} weights (one per task tensor), got {actual}")]
    WeightCountMismatch {
        /// Number of task tensors.
        expected: usize,
        /// Number of weights supplied.
        actual: usize,
    },

    /// Task tensors could not be stacked or reshaped.
    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// YAML parsing error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for merge operations.
pub type Result<T> = std::result::Result<T, MergeError>;
