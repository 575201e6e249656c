//! BM25 inverted-index model over the corpus.
//!
//! Statistics (document count, average length, per-term document frequency
//! and IDF) are derived once in [`LexicalIndex::build`] and never mutated.
//! A changed corpus needs a fresh build.

use crate::expand::QueryExpander;
use crate::tokenizer::tokenize;
use crate::{Bm25Params, Corpus, DocIndex, Filters, Hit, TermId};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

pub struct LexicalIndex {
    params: Bm25Params,
    corpus: Corpus,
    dictionary: HashMap<String, TermId>,
    df: Vec<u32>,
    idf: Vec<f32>,
    /// Per-document term counts over the searchable text.
    term_freqs: Vec<HashMap<TermId, u32>>,
    /// Tokenized searchable text, kept for history expansion.
    doc_tokens: Vec<Vec<String>>,
    doc_lengths: Vec<u32>,
    avg_doc_length: f32,
}

/// `ln((N - df + 0.5) / (df + 0.5) + 1)`. The `+ 1` keeps it positive even
/// for a term present in every document.
pub fn idf(num_docs: u32, df: u32) -> f32 {
    let n = num_docs as f32;
    let df = df as f32;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

impl LexicalIndex {
    pub fn build(corpus: Corpus, params: Bm25Params) -> Self {
        let mut next_term_id: TermId = 0;
        let mut dictionary: HashMap<String, TermId> = HashMap::new();
        let mut df: Vec<u32> = Vec::new();
        let mut term_freqs = Vec::with_capacity(corpus.len());
        let mut doc_tokens = Vec::with_capacity(corpus.len());
        let mut doc_lengths = Vec::with_capacity(corpus.len());
        let mut total_tokens: u64 = 0;

        for doc in corpus.iter() {
            let tokens = tokenize(&doc.searchable_text());
            let mut tf_counts: HashMap<TermId, u32> = HashMap::new();
            let mut seen_in_doc: HashSet<TermId> = HashSet::new();
            for term in &tokens {
                let tid = match dictionary.get(term) {
                    Some(&tid) => tid,
                    None => {
                        let id = next_term_id;
                        next_term_id += 1;
                        dictionary.insert(term.clone(), id);
                        df.push(0);
                        id
                    }
                };
                *tf_counts.entry(tid).or_insert(0) += 1;
                if seen_in_doc.insert(tid) {
                    df[tid as usize] += 1;
                }
            }
            total_tokens += tokens.len() as u64;
            doc_lengths.push(tokens.len() as u32);
            term_freqs.push(tf_counts);
            doc_tokens.push(tokens);
        }

        let num_docs = corpus.len() as u32;
        let avg_doc_length = if num_docs > 0 { total_tokens as f32 / num_docs as f32 } else { 0.0 };
        let idf: Vec<f32> = df.iter().map(|&d| idf(num_docs, d)).collect();
        tracing::info!(num_docs, num_terms = dictionary.len(), avg_doc_length, "built lexical index");

        Self { params, corpus, dictionary, df, idf, term_freqs, doc_tokens, doc_lengths, avg_doc_length }
    }

    pub fn corpus(&self) -> &Corpus { &self.corpus }
    pub fn num_docs(&self) -> usize { self.doc_lengths.len() }
    pub fn num_terms(&self) -> usize { self.dictionary.len() }
    pub fn avg_doc_length(&self) -> f32 { self.avg_doc_length }
    pub fn doc_length(&self, doc: DocIndex) -> Option<u32> { self.doc_lengths.get(doc).copied() }

    pub fn doc_freq(&self, term: &str) -> Option<u32> {
        self.dictionary.get(term).map(|&tid| self.df[tid as usize])
    }

    pub fn idf(&self, term: &str) -> Option<f32> {
        self.dictionary.get(term).map(|&tid| self.idf[tid as usize])
    }

    /// BM25 score of one document. Repeated query tokens count each time;
    /// tokens outside the vocabulary contribute nothing.
    pub fn score(&self, query_tokens: &[String], doc: DocIndex) -> f32 {
        let (Some(tfs), Some(&len)) = (self.term_freqs.get(doc), self.doc_lengths.get(doc)) else { return 0.0 };
        let Bm25Params { k1, b } = self.params;
        let length_ratio = if self.avg_doc_length > 0.0 { len as f32 / self.avg_doc_length } else { 0.0 };
        let norm = k1 * (1.0 - b + b * length_ratio);

        let mut score = 0.0f32;
        for token in query_tokens {
            let Some(&tid) = self.dictionary.get(token) else { continue };
            let tf = tfs.get(&tid).copied().unwrap_or(0) as f32;
            if tf == 0.0 { continue; }
            score += self.idf[tid as usize] * (tf * (k1 + 1.0)) / (tf + norm);
        }
        score
    }

    /// Rank the filter-surviving documents against `query` expanded with
    /// history tokens. Zero-scoring documents are dropped. Equal scores keep
    /// corpus order. Scores are raw BM25.
    pub fn search(&self, query: &str, top_k: usize, previous_course_ids: &[String], filters: &Filters) -> Vec<Hit> {
        let query_tokens = QueryExpander::new(&self.corpus).expand_tokens(tokenize(query), previous_course_ids, &self.doc_tokens);

        let mut scored: Vec<(DocIndex, f32)> = self
            .corpus
            .iter()
            .enumerate()
            .filter(|(_, doc)| filters.matches(doc))
            .map(|(idx, _)| (idx, self.score(&query_tokens, idx)))
            .filter(|(_, score)| *score != 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        tracing::debug!(query_tokens = query_tokens.len(), matches = scored.len(), top_k, "lexical search");

        scored
            .into_iter()
            .take(top_k)
            .filter_map(|(doc, score)| self.corpus.get(doc).map(|d| Hit { doc, document: d.clone(), score }))
            .collect()
    }
}
