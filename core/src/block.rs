//! Bounded-memory block indexing.
//!
//! Postings accumulate in an owned, term-sorted buffer. Every `block_size`
//! documents the buffer is moved out and written as one immutable block file,
//! so nothing survives in memory across a flush.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::analyzer::DocAnalysis;
use crate::error::{IndexError, Result};
use crate::index::{DocId, Posting, TermRecord};
use crate::persist::IndexPaths;

pub struct BlockIndexer {
    paths: IndexPaths,
    block_size: usize,
    buffer: BTreeMap<String, Vec<Posting>>,
    docs_in_block: usize,
    last_doc: Option<DocId>,
    blocks: Vec<PathBuf>,
}

impl BlockIndexer {
    pub fn new(paths: &IndexPaths, block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(IndexError::Config("block_size must be at least 1".into()));
        }
        fs::create_dir_all(paths.blocks_dir())?;
        Ok(Self {
            paths: paths.clone(),
            block_size,
            buffer: BTreeMap::new(),
            docs_in_block: 0,
            last_doc: None,
            blocks: Vec::new(),
        })
    }

    /// Add one document's postings. Returns the block written if this
    /// document completed one.
    pub fn index_document(&mut self, doc_id: DocId, analysis: &DocAnalysis) -> Result<Option<PathBuf>> {
        if self.last_doc.is_some_and(|last| doc_id <= last) {
            return Err(IndexError::Corrupt(format!(
                "doc {doc_id} indexed after doc {}",
                self.last_doc.unwrap_or_default()
            )));
        }
        self.last_doc = Some(doc_id);

        for (term, posting) in analysis.postings(doc_id) {
            match self.buffer.get_mut(term) {
                Some(list) => list.push(posting),
                None => {
                    self.buffer.insert(term.to_string(), vec![posting]);
                }
            }
        }
        self.docs_in_block += 1;
        if self.docs_in_block == self.block_size {
            return self.flush();
        }
        Ok(None)
    }

    /// Write the buffer as a new block file and clear it. A buffer with no
    /// postings writes nothing.
    pub fn flush(&mut self) -> Result<Option<PathBuf>> {
        let buffer = std::mem::take(&mut self.buffer);
        let docs = std::mem::replace(&mut self.docs_in_block, 0);
        if buffer.is_empty() {
            return Ok(None);
        }

        let path = self.paths.block_file(self.blocks.len() + 1);
        let terms = buffer.len();
        let mut out = BufWriter::new(File::create(&path)?);
        for (term, postings) in buffer {
            let line = TermRecord { term, postings }.to_line()?;
            out.write_all(line.as_bytes())?;
        }
        out.flush()?;
        tracing::debug!(block = %path.display(), docs, terms, "flushed block");
        self.blocks.push(path.clone());
        Ok(Some(path))
    }

    /// Flush any remainder and hand back every block written, in order.
    pub fn finish(mut self) -> Result<Vec<PathBuf>> {
        self.flush()?;
        Ok(self.blocks)
    }

    pub fn buffered_terms(&self) -> usize {
        self.buffer.len()
    }

    pub fn buffered_docs(&self) -> usize {
        self.docs_in_block
    }
}
