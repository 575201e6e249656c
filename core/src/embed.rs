//! The text-to-vector capability consumed by [`VectorIndex`](crate::VectorIndex).
//!
//! Vector generation lives outside the core; implementations wrap a remote
//! model (see the `coursematch-embedder` crate) or a local stand-in for tests.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbedError {
    /// Transport failure: connect, timeout, TLS.
    #[error("request failed: {0}")]
    Request(String),
    /// The provider answered with a non-success status.
    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode provider response: {0}")]
    Decode(String),
    /// The provider returned the wrong number of vectors.
    #[error("expected {expected} embeddings, got {actual}")]
    Shape { expected: usize, actual: usize },
}

/// Produces fixed-length dense vectors for text.
///
/// Every vector returned by one implementation must have the same length;
/// the indices reject mismatched dimensions.
pub trait Embedder: Send + Sync {
    /// Identifier recorded alongside cached vectors.
    fn model_id(&self) -> &str;

    /// Embed several texts in one call, preserving input order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut out = self.embed_batch(&[text.to_string()])?;
        match out.len() {
            1 => Ok(out.remove(0)),
            actual => Err(EmbedError::Shape { expected: 1, actual }),
        }
    }
}
