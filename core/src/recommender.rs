//! Hybrid recommendation: lexical and semantic retrieval fused into one ranking.

use crate::cache::EmbeddingCache;
use crate::{Corpus, DocKey, Document, Embedder, Error, Filters, FusionWeights, Hit, LexicalIndex, RecommenderConfig, Result, VectorIndex};
use parking_lot::RwLock;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// One recommendation. `document` is an independent copy of the indexed record.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredResult {
    pub document: Document,
    pub bm25_score_norm: f32,
    pub embedding_score_norm: f32,
    pub combined_score: f32,
}

pub struct Recommender {
    config: RecommenderConfig,
    lexical: LexicalIndex,
    vector: VectorIndex,
}

impl Recommender {
    pub fn build(corpus: Corpus, embedder: Arc<dyn Embedder>, cache: Option<&EmbeddingCache>, config: RecommenderConfig) -> Result<Self> {
        config.validate()?;
        let start = Instant::now();
        let lexical = LexicalIndex::build(corpus.clone(), config.bm25);
        let vector = VectorIndex::build(corpus, embedder, cache, config.embed_batch_size)?;
        tracing::info!(took_s = start.elapsed().as_secs_f64(), "recommender ready");
        Ok(Self { config, lexical, vector })
    }

    pub fn corpus(&self) -> &Corpus { self.lexical.corpus() }
    pub fn lexical(&self) -> &LexicalIndex { &self.lexical }
    pub fn vector(&self) -> &VectorIndex { &self.vector }

    /// Recommend with the configured fusion weights.
    pub fn recommend(&self, query: &str, previous_course_ids: &[String], filters: &Filters, top_k: usize) -> Result<Vec<ScoredResult>> {
        self.recommend_weighted(query, previous_course_ids, filters, top_k, self.config.fusion)
    }

    /// Retrieve `min(top_k * 3, 50)` candidates from each path, normalize the
    /// lexical window, fuse and truncate to `top_k`.
    pub fn recommend_weighted(
        &self,
        query: &str,
        previous_course_ids: &[String],
        filters: &Filters,
        top_k: usize,
        weights: FusionWeights,
    ) -> Result<Vec<ScoredResult>> {
        if query.trim().is_empty() {
            return Err(Error::EmptyQuery);
        }
        let start = Instant::now();
        let retrieve_k = self.config.retrieve_k(top_k);
        let lexical_hits = self.lexical.search(query, retrieve_k, previous_course_ids, filters);
        let semantic_hits = self.vector.search(query, retrieve_k, previous_course_ids, filters)?;
        tracing::debug!(
            retrieve_k,
            lexical = lexical_hits.len(),
            semantic = semantic_hits.len(),
            took_ms = start.elapsed().as_millis() as u64,
            "retrieved candidates"
        );
        Ok(fuse(lexical_hits, semantic_hits, weights, top_k))
    }
}

/// Min-max normalize scores over this window only. A flat window maps to 0.
pub fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    let Some(min) = scores.iter().copied().reduce(f32::min) else { return Vec::new() };
    let max = scores.iter().copied().fold(min, f32::max);
    let range = if max > min { max - min } else { 1.0 };
    scores.iter().map(|s| (s - min) / range).collect()
}

struct Fused {
    document: Document,
    bm25: f32,
    embedding: f32,
}

/// Merge both result windows by `(offering_id, section_id)`.
///
/// Lexical scores are min-max normalized within their window; similarities are
/// used as they come (or floored at 0 with `clamp_similarity`). A document
/// missing from one side scores 0 there. Ties keep merge order: lexical
/// results first, then semantic-only ones.
pub fn fuse(lexical_hits: Vec<Hit>, semantic_hits: Vec<Hit>, weights: FusionWeights, top_k: usize) -> Vec<ScoredResult> {
    let raw: Vec<f32> = lexical_hits.iter().map(|h| h.score).collect();
    let normalized = min_max_normalize(&raw);

    let mut merged: Vec<Fused> = Vec::with_capacity(lexical_hits.len() + semantic_hits.len());
    let mut slots: HashMap<DocKey, usize> = HashMap::new();
    for (hit, bm25) in lexical_hits.into_iter().zip(normalized) {
        slots.insert(hit.document.key(), merged.len());
        merged.push(Fused { document: hit.document, bm25, embedding: 0.0 });
    }
    for hit in semantic_hits {
        let similarity = if weights.clamp_similarity { hit.score.max(0.0) } else { hit.score };
        match slots.get(&hit.document.key()) {
            Some(&slot) => merged[slot].embedding = similarity,
            None => {
                slots.insert(hit.document.key(), merged.len());
                merged.push(Fused { document: hit.document, bm25: 0.0, embedding: similarity });
            }
        }
    }

    let mut results: Vec<ScoredResult> = merged
        .into_iter()
        .map(|f| ScoredResult {
            combined_score: weights.bm25_weight * f.bm25 + weights.embedding_weight * f.embedding,
            bm25_score_norm: f.bm25,
            embedding_score_norm: f.embedding,
            document: f.document,
        })
        .collect();
    results.sort_by(|a, b| b.combined_score.partial_cmp(&a.combined_score).unwrap_or(Ordering::Equal));
    results.truncate(top_k);
    results
}

/// The active recommender behind a lock that is only ever held to swap or
/// clone the `Arc`. Rebuilds happen off-lock on a fresh instance.
pub struct SharedRecommender {
    active: RwLock<Arc<Recommender>>,
}

impl SharedRecommender {
    pub fn new(recommender: Recommender) -> Self { Self { active: RwLock::new(Arc::new(recommender)) } }

    /// Snapshot for one query; later swaps do not affect it.
    pub fn current(&self) -> Arc<Recommender> { self.active.read().clone() }

    /// Install `next` and return the instance it replaced.
    pub fn replace(&self, next: Recommender) -> Arc<Recommender> {
        let num_docs = next.corpus().len();
        let previous = std::mem::replace(&mut *self.active.write(), Arc::new(next));
        tracing::info!(num_docs, "swapped active index");
        previous
    }
}
