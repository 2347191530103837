use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::UnicodeNormalization;

/// Index terms shorter than this (in chars, after stemming) are dropped.
/// Query terms are not filtered by length.
pub const MIN_INDEX_TERM_LEN: usize = 2;

lazy_static! {
    static ref DELIMITERS: Regex = Regex::new(r"[\s(){}\[\];,\-]+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
}

fn is_strippable(c: char) -> bool {
    c.is_ascii_punctuation()
        || c.is_whitespace()
        || matches!(c, '\u{2018}' | '\u{2019}' | '\u{201C}' | '\u{201D}')
}

/// Split text on whitespace, brackets, semicolons, commas and hyphens.
/// Empty pieces are skipped; the pieces are otherwise untouched.
pub fn split_raw(text: &str) -> impl Iterator<Item = &str> {
    DELIMITERS.split(text).filter(|s| !s.is_empty())
}

/// Reduce one raw token to its stemmed form: strip surrounding punctuation,
/// whitespace and typographic quotes, NFKC-normalize and lowercase, stem,
/// then strip again. Returns an empty string when nothing is left.
pub fn stem(word: &str) -> String {
    let stripped = word.trim_matches(is_strippable);
    if stripped.is_empty() {
        return String::new();
    }
    let normalized = stripped.nfkc().collect::<String>().to_lowercase();
    let stemmed = STEMMER.stem(&normalized);
    stemmed.trim_matches(is_strippable).to_string()
}

/// Tokenize a text fragment into index terms (stemmed, length-filtered).
pub fn index_terms(text: &str) -> Vec<String> {
    split_raw(text)
        .map(stem)
        .filter(|t| t.chars().count() >= MIN_INDEX_TERM_LEN)
        .collect()
}

/// Lowercase and split a query into raw terms, keeping positions and repeats.
pub fn query_terms(query: &str) -> Vec<String> {
    let lowered = query.to_lowercase();
    split_raw(&lowered).map(str::to_string).collect()
}
