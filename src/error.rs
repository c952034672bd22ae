use std::path::PathBuf;
use thiserror::Error;

use crate::config::Number;

pub type Result<T> = std::result::Result<T, ClipdexError>;

#[derive(Debug, Error)]
pub enum ClipdexError {
    #[error("Input not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Index not built: rank requires at least one indexed entry")]
    IndexNotBuilt,

    #[error("Malformed index: {vectors} vector rows but {identifiers} identifiers")]
    RowCountMismatch { vectors: usize, identifiers: usize },

    #[error("Corrupt index file '{path}': {reason}")]
    CorruptIndex { path: PathBuf, reason: String },

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("top_k must be greater than zero")]
    InvalidTopK,

    #[error("Confidence threshold must be within [0, 1], got {0}")]
    InvalidThreshold(Number),

    #[error("Cannot evaluate confidence of an empty ranking")]
    EmptyRanking,

    #[error("Identifier {0:?} cannot be persisted (contains a line break)")]
    InvalidIdentifier(String),

    #[error("No embedding for {kind} '{key}'")]
    EmbeddingNotFound { kind: &'static str, key: String },

    #[error("Embedding for {kind} '{key}' has no components")]
    EmptyEmbedding { kind: &'static str, key: String },

    #[error("Invalid embeddings file '{path}' line {line}: {reason}")]
    InvalidEmbeddings {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Invalid audio: {0}")]
    InvalidAudio(String),

    #[error("Worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("WAV decode error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),
}
