//! Dense-vector retrieval by cosine similarity.

use crate::cache::{CacheKey, EmbeddingCache};
use crate::expand::QueryExpander;
use crate::{Corpus, DocIndex, EmbedError, Embedder, Error, Filters, Hit, Result};
use std::cmp::Ordering;
use std::sync::Arc;

pub struct VectorIndex {
    corpus: Corpus,
    embedder: Arc<dyn Embedder>,
    embeddings: Vec<Vec<f32>>,
    norms: Vec<f32>,
    dimension: usize,
}

/// Cosine of the angle between `a` and `b`, unclamped. A zero vector has similarity 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a == 0.0 || norm_b == 0.0 { return 0.0; }
    dot(a, b) / (norm_a * norm_b)
}

fn dot(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }
fn l2_norm(v: &[f32]) -> f32 { dot(v, v).sqrt() }

impl VectorIndex {
    /// Embed every document, or reuse `cache` when it already holds a matching set.
    /// Fresh embeddings are written back to `cache`.
    pub fn build(corpus: Corpus, embedder: Arc<dyn Embedder>, cache: Option<&EmbeddingCache>, batch_size: usize) -> Result<Self> {
        let texts: Vec<String> = corpus.iter().map(|d| d.embedding_text()).collect();
        let key = CacheKey::new(embedder.model_id(), &texts);

        if let Some(cache) = cache.filter(|c| c.exists()) {
            let embeddings = cache.load(&key)?;
            return Self::from_embeddings(corpus, embedder, embeddings);
        }

        let batch_size = batch_size.max(1);
        let num_batches = texts.len().div_ceil(batch_size);
        let mut embeddings: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
        for (i, batch) in texts.chunks(batch_size).enumerate() {
            tracing::info!(batch = i + 1, num_batches, "embedding documents");
            let vectors = embedder.embed_batch(batch)?;
            if vectors.len() != batch.len() {
                return Err(EmbedError::Shape { expected: batch.len(), actual: vectors.len() }.into());
            }
            embeddings.extend(vectors);
        }

        let index = Self::from_embeddings(corpus, embedder, embeddings)?;
        if let Some(cache) = cache {
            cache.store(&key, &index.embeddings)?;
        }
        Ok(index)
    }

    /// Wrap precomputed vectors. They must align one-to-one with `corpus`
    /// and share one dimension.
    pub fn from_embeddings(corpus: Corpus, embedder: Arc<dyn Embedder>, embeddings: Vec<Vec<f32>>) -> Result<Self> {
        if embeddings.len() != corpus.len() {
            return Err(Error::CacheMismatch(format!("{} vectors for {} documents", embeddings.len(), corpus.len())));
        }
        let dimension = embeddings.first().map_or(0, Vec::len);
        if let Some(bad) = embeddings.iter().find(|v| v.len() != dimension) {
            return Err(Error::DimensionMismatch { expected: dimension, actual: bad.len() });
        }
        let norms = embeddings.iter().map(|v| l2_norm(v)).collect();
        tracing::info!(num_docs = embeddings.len(), dimension, model = embedder.model_id(), "built vector index");
        Ok(Self { corpus, embedder, embeddings, norms, dimension })
    }

    pub fn corpus(&self) -> &Corpus { &self.corpus }
    pub fn dimension(&self) -> usize { self.dimension }
    pub fn embeddings(&self) -> &[Vec<f32>] { &self.embeddings }
    pub fn model_id(&self) -> &str { self.embedder.model_id() }

    /// Cosine similarity of `query_vector` against each document, in corpus order.
    pub fn similarities(&self, query_vector: &[f32]) -> Result<Vec<f32>> {
        if query_vector.len() != self.dimension {
            return Err(Error::DimensionMismatch { expected: self.dimension, actual: query_vector.len() });
        }
        let query_norm = l2_norm(query_vector);
        Ok(self
            .embeddings
            .iter()
            .zip(&self.norms)
            .map(|(doc, &doc_norm)| {
                if query_norm == 0.0 || doc_norm == 0.0 { 0.0 } else { dot(doc, query_vector) / (doc_norm * query_norm) }
            })
            .collect())
    }

    /// Embed `query` plus a background suffix drawn from the student's
    /// history, then rank filter-surviving documents by raw similarity.
    /// Equal similarities keep corpus order.
    pub fn search(&self, query: &str, top_k: usize, previous_course_ids: &[String], filters: &Filters) -> Result<Vec<Hit>> {
        if self.corpus.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let full_query = QueryExpander::new(&self.corpus).expand_text(query, previous_course_ids);
        let query_vector = self.embedder.embed(&full_query)?;
        let similarities = self.similarities(&query_vector)?;

        let mut scored: Vec<(DocIndex, f32)> = similarities
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| self.corpus.get(*idx).is_some_and(|d| filters.matches(d)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        tracing::debug!(candidates = scored.len(), top_k, "vector search");

        Ok(scored
            .into_iter()
            .take(top_k)
            .filter_map(|(doc, score)| self.corpus.get(doc).map(|d| Hit { doc, document: d.clone(), score }))
            .collect())
    }
}
