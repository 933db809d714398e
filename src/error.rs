//! Error types for re-seq2seq

use thiserror::Error;

/// Errors raised while configuring, training or summarizing
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("Batch must contain at least one sample")]
    EmptyBatch,

    #[error("Tensor data conversion failed: {0}")]
    Data(String),

    #[error("Failed to persist configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for re-seq2seq operations
pub type Result<T> = std::result::Result<T, Error>;
