//! Disk-resident inverted index over a crawled HTML corpus.
//!
//! Construction analyzes each document, accumulates postings into bounded
//! blocks, merges the blocks into one term-sorted file and records a
//! term -> byte offset directory. Queries seek straight to each term's line
//! and rank boolean-AND matches by cosine similarity over tf-idf weights.

pub mod analyzer;
pub mod block;
pub mod build;
pub mod corpus;
pub mod error;
pub mod index;
pub mod merge;
pub mod persist;
pub mod scoring;
pub mod search;
pub mod tokenizer;

pub use build::{build_index, BuildConfig, BuildReport};
pub use error::{IndexError, Result};
pub use index::{DocId, Posting, TermRecord};
pub use persist::{reset_index_storage, IndexPaths};
pub use search::{ScoredDoc, SearchConfig, Searcher, UnknownTermPolicy};
