use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The embedding service call failed: transport, status or response shape.
    #[error("Embedding service error: {0}")]
    Service(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("Corrupt category file {path}:{line}: {reason}")]
    CorruptPersistence {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Cosine similarity is undefined for a zero-magnitude vector")]
    ZeroMagnitude,

    /// A component is NaN or infinite, or squaring it overflowed `f32`.
    #[error("Cosine similarity is undefined for non-finite vector values")]
    NonFinite,

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Invalid category name: {0:?}")]
    InvalidCategory(String),

    #[error("Failed to extract text from {path}: {reason}")]
    Extraction { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
