use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{IndexError, Result};

pub type DocId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub term_freq: u32,
    /// Term occurs inside a heading, bold, italic, emphasis, title or anchor.
    pub important: bool,
}

/// One line of a block file or of the merged index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TermRecord {
    pub term: String,
    pub postings: Vec<Posting>, // sorted by doc_id
}

impl TermRecord {
    /// Encode as a single newline-terminated line.
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)
            .map_err(|e| IndexError::Corrupt(format!("cannot encode term {:?}: {e}", self.term)))?;
        line.push('\n');
        Ok(line)
    }

    /// Strict schema parse of one line; `path` and `line_no` only label errors.
    pub fn parse_line(line: &str, path: &Path, line_no: usize) -> Result<Self> {
        Self::decode(line).map_err(|reason| IndexError::parse(path, line_no, reason))
    }

    /// Strict decoding of one line; the caller decides how to locate it.
    pub(crate) fn decode(line: &str) -> std::result::Result<Self, String> {
        let record: TermRecord =
            serde_json::from_str(line.trim_end_matches(['\n', '\r'])).map_err(|e| e.to_string())?;
        if record.term.is_empty() {
            return Err("empty term".to_string());
        }
        Ok(record)
    }

    /// Sort postings by doc_id and reject repeated doc ids.
    pub fn normalize(&mut self) -> Result<()> {
        self.postings.sort_by_key(|p| p.doc_id);
        if let Some(w) = self.postings.windows(2).find(|w| w[0].doc_id == w[1].doc_id) {
            return Err(IndexError::Corrupt(format!(
                "term {:?} has doc {} twice",
                self.term, w[0].doc_id
            )));
        }
        Ok(())
    }
}
