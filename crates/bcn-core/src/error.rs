use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading data or building and running the BCN.
#[derive(Debug, Error)]
pub enum BcnError {
    /// The transfer task name is not one of the supported tasks.
    #[error("unknown transfer task: {0:?}")]
    UnknownTask(String),

    /// A hyperparameter is outside its valid range.
    #[error("invalid hyperparameter: {0}")]
    InvalidHyperparameter(String),

    /// A dataset file is missing or unreadable.
    #[error("failed to read dataset file {path}: {source}")]
    DatasetIo {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying io error.
        source: std::io::Error,
    },

    /// A dataset line could not be parsed.
    #[error("{path}:{line}: {reason}")]
    MalformedLine {
        /// The file containing the line.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// A label that is not part of the task's label set.
    #[error("unknown label {0:?}")]
    UnknownLabel(String),

    /// The embedding cache is missing an entry or has inconsistent shapes.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Safetensors header or payload error.
    #[error("safetensors error: {0}")]
    Safetensors(#[from] safetensors::SafeTensorError),

    /// Candle ML framework error.
    #[error("tensor error: {0}")]
    Candle(#[from] candle_core::Error),

    /// Generic io error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for BCN operations.
pub type Result<T> = std::result::Result<T, BcnError>;
