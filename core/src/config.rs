use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// BM25 tuning: `k1` saturates term frequency, `b` scales length normalization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self { Self { k1: 1.5, b: 0.75 } }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionWeights {
    pub bm25_weight: f32,
    pub embedding_weight: f32,
    /// Clamp negative cosine similarities to 0 before fusing. Off by default,
    /// in which case combined scores range over
    /// `[-embedding_weight, bm25_weight + embedding_weight]`.
    pub clamp_similarity: bool,
}

impl Default for FusionWeights {
    fn default() -> Self { Self { bm25_weight: 0.3, embedding_weight: 0.7, clamp_similarity: false } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommenderConfig {
    pub bm25: Bm25Params,
    pub fusion: FusionWeights,
    /// Documents per `embed_batch` call during index build.
    pub embed_batch_size: usize,
    /// Each path retrieves `min(top_k * retrieve_multiplier, retrieve_cap)` candidates.
    pub retrieve_multiplier: usize,
    pub retrieve_cap: usize,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            bm25: Bm25Params::default(),
            fusion: FusionWeights::default(),
            embed_batch_size: 100,
            retrieve_multiplier: 3,
            retrieve_cap: 50,
        }
    }
}

impl RecommenderConfig {
    /// Read a JSON config; omitted keys keep their defaults.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: RecommenderConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.embed_batch_size == 0 {
            return Err(Error::Config("embed_batch_size must be at least 1".into()));
        }
        if !(self.bm25.k1 >= 0.0) || !(0.0..=1.0).contains(&self.bm25.b) {
            return Err(Error::Config(format!("bm25 parameters out of range: k1={} b={}", self.bm25.k1, self.bm25.b)));
        }
        Ok(())
    }

    pub fn retrieve_k(&self, top_k: usize) -> usize {
        top_k.saturating_mul(self.retrieve_multiplier).min(self.retrieve_cap)
    }
}
