//! Per-document term extraction from raw HTML.
//!
//! Every visible text node counts toward term frequency, whichever element it
//! sits in. Text under the elements in [`IMPORTANT_TAGS`] additionally marks
//! its terms as important. Script and style content is ignored entirely.

use lazy_static::lazy_static;
use scraper::{Html, Node, Selector};
use std::collections::{BTreeMap, BTreeSet};

use crate::index::{DocId, Posting};
use crate::tokenizer::index_terms;

pub const IMPORTANT_TAGS: &[&str] = &["h1", "h2", "h3", "b", "strong", "i", "em", "mark", "title", "a"];
const INVISIBLE_TAGS: &[&str] = &["script", "style"];

lazy_static! {
    static ref IMPORTANT: Selector = Selector::parse(&IMPORTANT_TAGS.join(", ")).expect("valid selector");
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DocAnalysis {
    pub term_freqs: BTreeMap<String, u32>,
    pub important: BTreeSet<String>,
}

impl DocAnalysis {
    /// One posting per distinct term, in term order.
    pub fn postings(&self, doc_id: DocId) -> impl Iterator<Item = (&str, Posting)> + '_ {
        self.term_freqs.iter().map(move |(term, &term_freq)| {
            let important = self.important.contains(term);
            (term.as_str(), Posting { doc_id, term_freq, important })
        })
    }

    pub fn is_empty(&self) -> bool {
        self.term_freqs.is_empty()
    }
}

pub fn analyze_html(html: &str) -> DocAnalysis {
    let doc = Html::parse_document(html);
    let mut analysis = DocAnalysis::default();

    for node in doc.tree.nodes() {
        let Node::Text(text) = node.value() else { continue };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| INVISIBLE_TAGS.contains(&e.name()))
        });
        if hidden {
            continue;
        }
        for term in index_terms(text) {
            *analysis.term_freqs.entry(term).or_insert(0) += 1;
        }
    }

    for element in doc.select(&IMPORTANT) {
        for chunk in element.text() {
            analysis.important.extend(index_terms(chunk));
        }
    }
    // Keep the important set a subset of the counted terms.
    analysis.important.retain(|t| analysis.term_freqs.contains_key(t));
    analysis
}
