use coursematch_core::tokenizer::tokenize;

#[test]
fn it_lowercases_and_keeps_order() {
    let toks = tokenize("Machine LEARNING machine");
    assert_eq!(toks, vec!["machine", "learning", "machine"]);
}

#[test]
fn it_splits_on_punctuation() {
    let toks = tokenize("EN.601.220 (Intermediate Programming)");
    assert_eq!(toks, vec!["en", "601", "220", "intermediate", "programming"]);
}

#[test]
fn punctuation_only_is_empty() {
    assert!(tokenize("--- ,.;!? ()").is_empty());
    assert!(tokenize("").is_empty());
}

#[test]
fn tokens_are_lowercase_word_runs() {
    for tok in tokenize("Über-Cool ÆON_42 stuff; x9") {
        assert!(!tok.is_empty());
        assert!(tok.chars().all(|c| c.is_alphanumeric() || c == '_'));
        assert_eq!(tok, tok.to_lowercase());
    }
}
