//! History-based query expansion.
//!
//! The lexical and semantic paths expand differently on purpose: the lexical
//! path appends a handful of long tokens per matched course, the semantic path
//! appends a prose "Student background" suffix built from every match.

use crate::{Corpus, DocIndex};

/// Tokens contributed per matched course on the lexical path.
pub const LEXICAL_TOKENS_PER_COURSE: usize = 5;
/// Tokens must be longer than this many characters to be contributed.
pub const LEXICAL_MIN_TOKEN_CHARS: usize = 3;
/// Characters of each matched description added to the semantic query.
pub const BACKGROUND_DESCRIPTION_CHARS: usize = 200;

pub struct QueryExpander<'a> {
    corpus: &'a Corpus,
}

impl<'a> QueryExpander<'a> {
    pub fn new(corpus: &'a Corpus) -> Self { Self { corpus } }

    /// Corpus positions of the first document per matching id, in id order.
    /// Unmatched ids are skipped.
    pub fn matched(&self, previous_course_ids: &[String]) -> Vec<DocIndex> {
        previous_course_ids.iter().filter_map(|id| self.corpus.find_offering(id)).collect()
    }

    /// Append up to five long tokens from each matched course's searchable text.
    /// `doc_tokens` is the lexical index's tokenized text, aligned to corpus order.
    pub fn expand_tokens(&self, mut query_tokens: Vec<String>, previous_course_ids: &[String], doc_tokens: &[Vec<String>]) -> Vec<String> {
        for idx in self.matched(previous_course_ids) {
            let Some(tokens) = doc_tokens.get(idx) else { continue };
            query_tokens.extend(
                tokens
                    .iter()
                    .filter(|t| t.chars().count() > LEXICAL_MIN_TOKEN_CHARS)
                    .take(LEXICAL_TOKENS_PER_COURSE)
                    .cloned(),
            );
        }
        query_tokens
    }

    /// Append a "Student background" suffix with each match's title and the
    /// start of its description. Returns `query` unchanged when nothing matched.
    pub fn expand_text(&self, query: &str, previous_course_ids: &[String]) -> String {
        let mut background: Vec<String> = Vec::new();
        for idx in self.matched(previous_course_ids) {
            let Some(doc) = self.corpus.get(idx) else { continue };
            background.push(doc.title().to_string());
            background.push(doc.description().chars().take(BACKGROUND_DESCRIPTION_CHARS).collect());
        }
        if background.is_empty() {
            return query.to_string();
        }
        format!("{query}\n\nStudent background: {}", background.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;
    use crate::Document;

    fn corpus() -> Corpus {
        Corpus::new(vec![
            Document {
                offering_id: Some("EN.601.220".into()),
                title: Some("Intermediate Programming".into()),
                description: Some("x".repeat(250)),
                ..Default::default()
            },
            Document {
                offering_id: Some("EN.601.226".into()),
                title: Some("Data Structures".into()),
                description: Some("Trees and graphs.".into()),
                ..Default::default()
            },
        ])
    }

    #[test]
    fn lexical_expansion_caps_each_course() {
        let corpus = corpus();
        let doc_tokens = vec![
            tokenize("a bb ccc dddd eeeee ffffff ggggggg hhhhhhhh iiiiiiiii"),
            tokenize("data structures trees"),
        ];
        let ids = vec!["EN.601.220".to_string(), "NOPE.1".to_string(), "EN.601.226".to_string()];
        let out = QueryExpander::new(&corpus).expand_tokens(vec!["q".into()], &ids, &doc_tokens);
        assert_eq!(out, vec!["q", "dddd", "eeeee", "ffffff", "ggggggg", "hhhhhhhh", "data", "structures", "trees"]);
    }

    #[test]
    fn unmatched_history_leaves_query_alone() {
        let corpus = corpus();
        let ids = vec!["XX.000.000".to_string()];
        let expander = QueryExpander::new(&corpus);
        assert_eq!(expander.expand_text("robots", &ids), "robots");
        assert_eq!(expander.expand_tokens(vec!["robots".into()], &ids, &[]), vec!["robots"]);
    }

    #[test]
    fn semantic_expansion_uses_every_match() {
        let corpus = corpus();
        let ids = vec!["EN.601.220".to_string(), "EN.601.226".to_string()];
        let text = QueryExpander::new(&corpus).expand_text("robots", &ids);
        let expected = format!(
            "robots\n\nStudent background: Intermediate Programming {} Data Structures Trees and graphs.",
            "x".repeat(200)
        );
        assert_eq!(text, expected);
    }
}
