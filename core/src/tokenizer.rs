use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref RE: Regex = Regex::new(r"\w+").expect("valid regex");
}

/// Lowercase `text` and return its maximal word-character runs in encounter order.
/// Duplicates are kept; everything else is discarded.
pub fn tokenize(text: &str) -> Vec<String> {
    if text.is_empty() { return Vec::new(); }
    let lowered = text.to_lowercase();
    RE.find_iter(&lowered).map(|m| m.as_str().to_string()).collect()
}
