//! Query processing over a built index.
//!
//! A query is split into raw terms, each position is stemmed and looked up
//! through the term directory with a direct seek into the merged index. The
//! documents found for every known term form a boolean-AND candidate set,
//! ranked by the cosine between each document's normalized tf-idf row and the
//! normalized query weights. Equal scores are ordered by ascending doc id.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};

use crate::error::{IndexError, Result};
use crate::index::{DocId, Posting, TermRecord};
use crate::persist::{load_metadata, verify_index, IndexPaths, Metadata};
use crate::scoring::{dot, idf, l2_normalize, query_weights, weighted_tf};
use crate::tokenizer::{query_terms, stem};

/// What to do with a query term that is not in the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownTermPolicy {
    /// Drop the term from scoring and from the AND filter.
    #[default]
    Ignore,
    /// Any unknown term makes the whole query match nothing.
    RequireAll,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub unknown_terms: UnknownTermPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredDoc {
    pub doc_id: DocId,
    pub score: f64,
}

pub struct Searcher {
    paths: IndexPaths,
    meta: Metadata,
    config: SearchConfig,
}

impl Searcher {
    pub fn open(paths: &IndexPaths) -> Result<Self> {
        Self::open_with(paths, SearchConfig::default())
    }

    /// Load metadata and check it belongs to the merged index on disk.
    pub fn open_with(paths: &IndexPaths, config: SearchConfig) -> Result<Self> {
        let meta = load_metadata(paths)?;
        verify_index(paths, &meta)?;
        tracing::info!(
            docs = meta.total_docs,
            terms = meta.directory.len(),
            created_at = %meta.created_at,
            "index opened"
        );
        Ok(Self { paths: paths.clone(), meta, config })
    }

    pub fn total_docs(&self) -> u32 {
        self.meta.total_docs
    }

    pub fn doc_id_to_url(&self) -> &BTreeMap<DocId, String> {
        &self.meta.doc_urls
    }

    pub fn url(&self, doc_id: DocId) -> Option<&str> {
        self.meta.doc_urls.get(&doc_id).map(String::as_str)
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.meta.directory.keys().map(String::as_str)
    }

    /// Postings of an already-stemmed term, or `None` if it is not indexed.
    pub fn postings(&self, term: &str) -> Result<Option<Vec<Posting>>> {
        let Some(&offset) = self.meta.directory.get(term) else {
            return Ok(None);
        };
        let mut reader = self.open_index()?;
        Ok(Some(self.read_record(&mut reader, term, offset)?.postings))
    }

    /// Ranked doc ids, most relevant first.
    pub fn search(&self, query: &str) -> Result<Vec<DocId>> {
        Ok(self.search_scored(query)?.into_iter().map(|d| d.doc_id).collect())
    }

    pub fn search_scored(&self, query: &str) -> Result<Vec<ScoredDoc>> {
        let raw = query_terms(query);
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        let positions = raw.len();
        let mut weights = query_weights(&raw);

        // Each call owns its reader; seeks never race between queries.
        let mut reader = self.open_index()?;
        let mut fetched: HashMap<String, TermRecord> = HashMap::new();
        let mut rows: BTreeMap<DocId, Vec<f64>> = BTreeMap::new();
        let mut matched: Option<BTreeSet<DocId>> = None;

        for (i, term) in raw.iter().enumerate() {
            let stemmed = stem(term);
            if stemmed.is_empty() {
                continue;
            }
            let Some(&offset) = self.meta.directory.get(&stemmed) else {
                if self.config.unknown_terms == UnknownTermPolicy::RequireAll {
                    tracing::debug!(term = %stemmed, "unknown term, query matches nothing");
                    return Ok(Vec::new());
                }
                continue;
            };

            if !fetched.contains_key(&stemmed) {
                let record = self.read_record(&mut reader, &stemmed, offset)?;
                fetched.insert(stemmed.clone(), record);
            }
            let record = &fetched[&stemmed];

            let df = record.postings.len();
            if df == 0 {
                return Err(IndexError::Corrupt(format!("term {stemmed:?} has no postings")));
            }
            let term_idf = idf(df, self.meta.total_docs);

            let mut candidates = BTreeSet::new();
            for p in &record.postings {
                if p.doc_id == 0 || p.doc_id > self.meta.total_docs {
                    return Err(IndexError::Corrupt(format!(
                        "term {stemmed:?} references unknown doc {}",
                        p.doc_id
                    )));
                }
                let row = rows.entry(p.doc_id).or_insert_with(|| vec![0.0; positions]);
                row[i] = weighted_tf(p.term_freq, p.important) * term_idf;
                candidates.insert(p.doc_id);
            }

            matched = Some(match matched {
                None => candidates,
                Some(prev) => prev.intersection(&candidates).copied().collect(),
            });
        }

        let Some(matched) = matched else {
            return Ok(Vec::new());
        };

        l2_normalize(&mut weights);
        let mut ranked: Vec<ScoredDoc> = matched
            .into_iter()
            .map(|doc_id| {
                let mut row = rows.remove(&doc_id).unwrap_or_else(|| vec![0.0; positions]);
                l2_normalize(&mut row);
                ScoredDoc { doc_id, score: dot(&row, &weights) }
            })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.doc_id.cmp(&b.doc_id)));
        Ok(ranked)
    }

    fn open_index(&self) -> Result<BufReader<File>> {
        let path = self.paths.index_file();
        let file = File::open(&path).map_err(|e| {
            IndexError::Inconsistent(format!("cannot open merged index {}: {e}", path.display()))
        })?;
        Ok(BufReader::new(file))
    }

    fn read_record(&self, reader: &mut BufReader<File>, term: &str, offset: u64) -> Result<TermRecord> {
        if offset >= self.meta.index_len {
            return Err(IndexError::Inconsistent(format!(
                "offset {offset} for {term:?} is past the end of the index"
            )));
        }
        reader.seek(SeekFrom::Start(offset))?;
        let mut line = String::new();
        reader.read_line(&mut line)?;
        let record = TermRecord::decode(&line).map_err(|reason| {
            IndexError::Corrupt(format!(
                "unreadable record at byte {offset} of {}: {reason}",
                self.paths.index_file().display()
            ))
        })?;
        if record.term != term {
            return Err(IndexError::Inconsistent(format!(
                "directory entry for {term:?} points at {:?}",
                record.term
            )));
        }
        Ok(record)
    }
}
