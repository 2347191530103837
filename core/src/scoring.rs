//! tf-idf weighting and the vector helpers used for cosine ranking.
//! All logarithms are base 10.

use std::collections::HashMap;

/// Multiplier applied to a posting whose term sits in an important element.
pub const IMPORTANT_BOOST: f64 = 2.0;

/// `log10(total_docs / df)`; callers guarantee `df >= 1`.
pub fn idf(df: usize, total_docs: u32) -> f64 {
    (f64::from(total_docs) / df as f64).log10()
}

/// `(1 + log10(tf)) * idf`, doubled for important postings.
pub fn tf_idf(term_freq: u32, important: bool, df: usize, total_docs: u32) -> f64 {
    weighted_tf(term_freq, important) * idf(df, total_docs)
}

pub(crate) fn weighted_tf(term_freq: u32, important: bool) -> f64 {
    let tf = 1.0 + f64::from(term_freq.max(1)).log10();
    if important { tf * IMPORTANT_BOOST } else { tf }
}

/// One weight per query position: `1 + log10(c)` where `c` counts how often
/// that raw term occurs in the whole query.
pub fn query_weights(raw_terms: &[String]) -> Vec<f64> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for t in raw_terms {
        *counts.entry(t.as_str()).or_insert(0) += 1;
    }
    raw_terms
        .iter()
        .map(|t| match counts.get(t.as_str()) {
            Some(&c) if c > 0 => 1.0 + f64::from(c).log10(),
            _ => 1.0,
        })
        .collect()
}

/// Scale to unit Euclidean length. A zero vector is left untouched.
pub fn l2_normalize(v: &mut [f64]) {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
