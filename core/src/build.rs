//! End-to-end index construction: corpus traversal, analysis, block
//! indexing, merge and metadata.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::analyzer::{analyze_html, DocAnalysis};
use crate::block::BlockIndexer;
use crate::corpus::{discover, read_document};
use crate::error::{IndexError, Result};
use crate::index::DocId;
use crate::merge::merge_blocks;
use crate::persist::{
    file_fingerprint, now_rfc3339, reset_index_storage, save_metadata, staging_path, IndexPaths, Metadata,
    METADATA_VERSION,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Documents per block; `usize::MAX` keeps the whole corpus in one block.
    pub block_size: usize,
    /// Most block files opened at once while merging.
    pub max_fan_in: usize,
    /// Abort on the first unreadable document instead of skipping it.
    pub strict: bool,
    /// Documents analyzed in parallel before being indexed in order.
    pub analysis_batch: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self { block_size: 10, max_fan_in: 64, strict: false, analysis_batch: 256 }
    }
}

impl BuildConfig {
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(IndexError::Config("block_size must be at least 1".into()));
        }
        if self.max_fan_in < 2 {
            return Err(IndexError::Config("max_fan_in must be at least 2".into()));
        }
        if self.analysis_batch == 0 {
            return Err(IndexError::Config("analysis_batch must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default, Serialize)]
pub struct BuildReport {
    pub total_docs: u32,
    pub skipped: Vec<SkippedFile>,
    pub blocks: usize,
    pub merge_passes: usize,
    pub terms: usize,
}

/// Build a fresh index under `paths` from every document below `corpus_root`.
///
/// The previous generation is discarded first. On failure neither the merged
/// index nor the metadata is left behind. The index root and the corpus must
/// not contain one another; that is checked before anything is deleted.
pub fn build_index(paths: &IndexPaths, corpus_root: &Path, config: &BuildConfig) -> Result<BuildReport> {
    config.validate()?;
    ensure_disjoint(paths, corpus_root)?;
    reset_index_storage(paths)?;
    let result = run_build(paths, corpus_root, config);
    if result.is_err() {
        discard_outputs(paths);
    }
    result
}

fn run_build(paths: &IndexPaths, corpus_root: &Path, config: &BuildConfig) -> Result<BuildReport> {
    let files = discover(corpus_root)?;
    tracing::info!(files = files.len(), root = %corpus_root.display(), "corpus discovered");

    let mut indexer = BlockIndexer::new(paths, config.block_size)?;
    let mut doc_urls: BTreeMap<DocId, String> = BTreeMap::new();
    let mut report = BuildReport::default();
    let mut next_doc_id: DocId = 0;

    for batch in files.chunks(config.analysis_batch) {
        let analyzed: Vec<Result<(String, DocAnalysis)>> = batch
            .par_iter()
            .map(|path| read_document(path).map(|doc| (doc.url, analyze_html(&doc.content))))
            .collect();

        for (path, outcome) in batch.iter().zip(analyzed) {
            match outcome {
                Ok((url, analysis)) => {
                    next_doc_id += 1;
                    doc_urls.insert(next_doc_id, url);
                    indexer.index_document(next_doc_id, &analysis)?;
                }
                Err(e) if !config.strict => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping document");
                    report.skipped.push(SkippedFile { path: path.clone(), reason: e.to_string() });
                }
                Err(e) => return Err(e),
            }
        }
    }

    let blocks = indexer.finish()?;
    tracing::info!(docs = next_doc_id, blocks = blocks.len(), skipped = report.skipped.len(), "blocks written");

    let merged = merge_blocks(paths, &blocks, config.max_fan_in)?;
    let (index_len, index_crc32) = file_fingerprint(&paths.index_file())?;
    let meta = Metadata {
        version: METADATA_VERSION,
        created_at: now_rfc3339(),
        total_docs: next_doc_id,
        doc_urls,
        directory: merged.directory,
        index_len,
        index_crc32,
    };
    save_metadata(paths, &meta)?;

    for dir in [paths.blocks_dir(), paths.runs_dir()] {
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
    }

    report.total_docs = next_doc_id;
    report.blocks = blocks.len();
    report.merge_passes = merged.passes;
    report.terms = merged.terms;
    tracing::info!(
        docs = report.total_docs,
        terms = report.terms,
        passes = report.merge_passes,
        skipped = report.skipped.len(),
        "index build complete"
    );
    Ok(report)
}

fn ensure_disjoint(paths: &IndexPaths, corpus_root: &Path) -> Result<()> {
    let corpus = corpus_root
        .canonicalize()
        .map_err(|e| IndexError::corpus(corpus_root, format!("cannot resolve corpus root: {e}")))?;
    let root = resolve_pending(&paths.root)?;
    if corpus.starts_with(&root) || root.starts_with(&corpus) {
        return Err(IndexError::Config(format!(
            "index root {} and corpus root {} overlap",
            root.display(),
            corpus.display()
        )));
    }
    Ok(())
}

/// Canonical form of a path that may not exist yet: its nearest existing
/// ancestor is canonicalized and the missing components appended.
fn resolve_pending(path: &Path) -> Result<PathBuf> {
    let mut missing = Vec::new();
    let mut current = path;
    loop {
        match current.canonicalize() {
            Ok(mut resolved) => {
                resolved.extend(missing.iter().rev());
                return Ok(resolved);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let (Some(parent), Some(name)) = (current.parent(), current.file_name()) else {
                    return Err(e.into());
                };
                missing.push(name);
                current = if parent.as_os_str().is_empty() { Path::new(".") } else { parent };
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn discard_outputs(paths: &IndexPaths) {
    for file in [paths.index_file(), paths.metadata_file()] {
        for path in [staging_path(&file), file] {
            if let Err(e) = remove_if_present(&path) {
                tracing::warn!(path = %path.display(), error = %e, "could not discard partial output");
            }
        }
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        BuildConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_degenerate_settings() {
        for config in [
            BuildConfig { block_size: 0, ..Default::default() },
            BuildConfig { max_fan_in: 1, ..Default::default() },
            BuildConfig { analysis_batch: 0, ..Default::default() },
        ] {
            assert!(matches!(config.validate(), Err(IndexError::Config(_))));
        }
    }

    #[test]
    fn missing_index_root_resolves_through_existing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let pending = dir.path().join("not").join("yet");
        let resolved = resolve_pending(&pending).unwrap();
        assert_eq!(resolved, dir.path().canonicalize().unwrap().join("not").join("yet"));
    }

    #[test]
    fn removing_an_absent_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        remove_if_present(&dir.path().join("gone.jsonl")).unwrap();
        // a directory cannot be removed as a file
        assert!(remove_if_present(dir.path()).is_err());
    }

    #[test]
    fn config_fills_missing_fields_from_defaults() {
        let config: BuildConfig = serde_json::from_str(r#"{"block_size": 3}"#).unwrap();
        assert_eq!(config.block_size, 3);
        assert_eq!(config.max_fan_in, 64);
        assert!(!config.strict);
    }
}
