pub mod cache;
pub mod config;
pub mod corpus;
pub mod document;
pub mod embed;
pub mod error;
pub mod expand;
pub mod filter;
pub mod lexical;
pub mod recommender;
pub mod tokenizer;
pub mod vector;

pub use config::{Bm25Params, FusionWeights, RecommenderConfig};
pub use corpus::Corpus;
pub use document::{DocKey, Document, Prerequisite};
pub use embed::{EmbedError, Embedder};
pub use error::{Error, Result};
pub use filter::Filters;
pub use lexical::LexicalIndex;
pub use recommender::{Recommender, ScoredResult, SharedRecommender};
pub use vector::VectorIndex;

/// Position of a document in corpus order.
pub type DocIndex = usize;
pub type TermId = u32;

/// A document paired with the raw score one retrieval path gave it.
#[derive(Debug, Clone)]
pub struct Hit {
    pub doc: DocIndex,
    pub document: Document,
    pub score: f32,
}
