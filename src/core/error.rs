//! Error types for SVM implementation

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SVMError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Specified nu is infeasible")]
    InfeasibleNu,

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Empty dataset")]
    EmptyDataset,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid model file: {0}")]
    ModelFormat(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Training cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, SVMError>;
