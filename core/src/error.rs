//! Error type shared by the core library.

use crate::embed::EmbedError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The caller sent an empty or whitespace-only query.
    #[error("query is empty")]
    EmptyQuery,
    /// A stored embedding set does not line up with the corpus being indexed.
    #[error("embedding cache mismatch: {0}")]
    CacheMismatch(String),
    /// A vector's length differs from the index dimensionality.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),
    #[error("invalid corpus: {0}")]
    Corpus(String),
    #[error("invalid config: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Bincode(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
