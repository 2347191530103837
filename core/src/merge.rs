//! External k-way merge of block files into the single term-sorted index.
//!
//! Each input keeps one buffered record. The smallest buffered term is taken
//! from every input that holds it, the posting lists are concatenated and
//! re-sorted by doc id, and the combined line is written out. When there are
//! more inputs than `max_fan_in`, intermediate runs are produced first so that
//! at most `max_fan_in` files are ever open at once.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};
use crate::index::TermRecord;
use crate::persist::{staging_path, IndexPaths};

struct BlockCursor {
    path: PathBuf,
    reader: BufReader<File>,
    line_no: usize,
    current: Option<TermRecord>,
}

impl BlockCursor {
    fn open(path: &Path) -> Result<Self> {
        let mut cursor = Self {
            path: path.to_path_buf(),
            reader: BufReader::new(File::open(path)?),
            line_no: 0,
            current: None,
        };
        cursor.advance()?;
        Ok(cursor)
    }

    /// Load the next record, or leave `current` empty at end of file.
    fn advance(&mut self) -> Result<()> {
        let previous = self.current.take().map(|r| r.term);
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(());
            }
            self.line_no += 1;
            if !line.trim().is_empty() {
                break;
            }
        }
        let record = TermRecord::parse_line(&line, &self.path, self.line_no)?;
        if previous.as_ref().is_some_and(|p| *p >= record.term) {
            return Err(IndexError::Corrupt(format!(
                "{} line {}: term {:?} out of order",
                self.path.display(),
                self.line_no,
                record.term
            )));
        }
        self.current = Some(record);
        Ok(())
    }
}

/// Counts bytes so each line's starting offset is known.
struct OffsetWriter {
    inner: BufWriter<File>,
    offset: u64,
}

impl OffsetWriter {
    fn create(path: &Path) -> Result<Self> {
        Ok(Self { inner: BufWriter::new(File::create(path)?), offset: 0 })
    }

    fn write_line(&mut self, line: &str) -> Result<u64> {
        let start = self.offset;
        self.inner.write_all(line.as_bytes())?;
        self.offset += line.len() as u64;
        Ok(start)
    }

    fn finish(self) -> Result<u64> {
        let file = self.inner.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(self.offset)
    }
}

#[derive(Debug, Default)]
pub struct MergeSummary {
    /// term -> starting byte offset, filled only when requested
    pub directory: HashMap<String, u64>,
    pub terms: usize,
    pub bytes: u64,
}

#[derive(Debug, Default)]
pub struct MergeOutcome {
    pub directory: HashMap<String, u64>,
    pub terms: usize,
    pub passes: usize,
}

/// Single-pass merge of `inputs` into `output`. The output is staged next to
/// its final path and renamed into place only once complete.
pub fn merge_files(inputs: &[PathBuf], output: &Path, record_directory: bool) -> Result<MergeSummary> {
    let mut cursors = inputs
        .iter()
        .map(|p| BlockCursor::open(p))
        .collect::<Result<Vec<_>>>()?;

    let mut heap = BinaryHeap::new();
    for (idx, cursor) in cursors.iter().enumerate() {
        if let Some(rec) = &cursor.current {
            heap.push(Reverse((rec.term.clone(), idx)));
        }
    }

    let staging = staging_path(output);
    let mut out = OffsetWriter::create(&staging)?;
    let mut summary = MergeSummary::default();

    while let Some(Reverse((term, first))) = heap.pop() {
        let mut sources = vec![first];
        while heap.peek().is_some_and(|Reverse((t, _))| *t == term) {
            if let Some(Reverse((_, idx))) = heap.pop() {
                sources.push(idx);
            }
        }

        let mut combined = TermRecord { term, postings: Vec::new() };
        for idx in sources {
            let cursor = &mut cursors[idx];
            if let Some(rec) = cursor.current.as_mut() {
                combined.postings.append(&mut rec.postings);
            }
            cursor.advance()?;
            if let Some(rec) = &cursor.current {
                heap.push(Reverse((rec.term.clone(), idx)));
            }
        }
        combined.normalize()?;

        let offset = out.write_line(&combined.to_line()?)?;
        if record_directory {
            summary.directory.insert(combined.term, offset);
        }
        summary.terms += 1;
    }

    summary.bytes = out.finish()?;
    fs::rename(&staging, output)?;
    Ok(summary)
}

/// Merge every block into the merged index, in as many passes as the
/// fan-in bound requires. Intermediate runs are deleted once consumed.
pub fn merge_blocks(paths: &IndexPaths, blocks: &[PathBuf], max_fan_in: usize) -> Result<MergeOutcome> {
    if max_fan_in < 2 {
        return Err(IndexError::Config("max_fan_in must be at least 2".into()));
    }

    let mut inputs = blocks.to_vec();
    let mut pass = 0;
    while inputs.len() > max_fan_in {
        pass += 1;
        fs::create_dir_all(paths.runs_dir())?;
        let mut runs = Vec::with_capacity(inputs.len().div_ceil(max_fan_in));
        for (seq, group) in inputs.chunks(max_fan_in).enumerate() {
            let run = paths.run_file(pass, seq + 1);
            merge_files(group, &run, false)?;
            runs.push(run);
        }
        tracing::debug!(pass, inputs = inputs.len(), runs = runs.len(), "merge pass complete");
        if pass > 1 {
            for consumed in &inputs {
                fs::remove_file(consumed)?;
            }
        }
        inputs = runs;
    }

    let summary = merge_files(&inputs, &paths.index_file(), true)?;
    if pass > 0 {
        for consumed in &inputs {
            fs::remove_file(consumed)?;
        }
    }
    tracing::info!(terms = summary.terms, bytes = summary.bytes, passes = pass + 1, "merged index written");
    Ok(MergeOutcome { directory: summary.directory, terms: summary.terms, passes: pass + 1 })
}
