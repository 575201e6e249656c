use crate::document::{Document, Field};
use std::collections::BTreeMap;

/// Exact-match predicate over declared document fields.
///
/// Every listed field must equal its required value. A key that names no
/// known field, or a field the document never carried, is a non-match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    required: BTreeMap<String, String>,
}

impl Filters {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.required.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool { self.required.is_empty() }

    pub fn matches(&self, doc: &Document) -> bool {
        self.required.iter().all(|(name, want)| {
            Field::parse(name).and_then(|f| doc.field(f)).is_some_and(|have| have == want)
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Filters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { required: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document {
            department: Some("EN Computer Science".into()),
            level: Some("Graduate".into()),
            ..Default::default()
        }
    }

    #[test]
    fn empty_filters_match_everything() {
        assert!(Filters::new().matches(&doc()));
    }

    #[test]
    fn all_fields_must_match_exactly() {
        let f = Filters::new().with("Department", "EN Computer Science").with("level", "Graduate");
        assert!(f.matches(&doc()));
        let partial = Filters::new().with("Department", "EN Computer");
        assert!(!partial.matches(&doc()));
    }

    #[test]
    fn absent_or_unknown_field_excludes() {
        assert!(!Filters::new().with("SchoolName", "").matches(&doc()));
        assert!(!Filters::new().with("Color", "blue").matches(&doc()));
    }
}
