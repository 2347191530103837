use blockdex_core::tokenizer::{index_terms, query_terms, stem};

#[test]
fn it_normalizes_and_stems() {
    let words = index_terms("Running Runners RUN! The café’s menu.");
    assert!(words.contains(&"run".to_string()));
    assert!(words.contains(&"menu".to_string()));
    assert!(words.iter().all(|w| w.chars().count() >= 2));
}

#[test]
fn query_side_keeps_short_stems() {
    // index time drops one-letter terms, query time does not
    assert!(index_terms("a").is_empty());
    assert_eq!(stem("a"), "a");
    let raw = query_terms("A cat");
    assert_eq!(raw, vec!["a", "cat"]);
}

#[test]
fn stemming_is_pure() {
    for w in ["Searching", "engines", "“quoted”", "x-ray"] {
        assert_eq!(stem(w), stem(w));
    }
}
