use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{IndexError, Result};

/// Files with this extension are corpus documents; everything else is ignored.
pub const DOCUMENT_EXTENSION: &str = "json";

#[derive(Debug, Clone, Deserialize)]
pub struct CorpusDocument {
    pub url: String,
    /// Raw HTML of the crawled page.
    pub content: String,
}

/// All document files under `root`, in a stable (file-name sorted) order.
pub fn discover(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(IndexError::corpus(root, "corpus root is not a directory"));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable corpus entry");
                continue;
            }
        };
        let p = entry.path();
        if entry.file_type().is_file() && p.extension().and_then(|s| s.to_str()) == Some(DOCUMENT_EXTENSION) {
            files.push(p.to_path_buf());
        }
    }
    Ok(files)
}

pub fn read_document(path: &Path) -> Result<CorpusDocument> {
    let f = File::open(path).map_err(|e| IndexError::corpus(path, e))?;
    serde_json::from_reader(BufReader::new(f)).map_err(|e| IndexError::corpus(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn discovers_nested_documents_in_order() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b/nested")).unwrap();
        fs::write(dir.path().join("b/nested/2.json"), "{}").unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        fs::write(dir.path().join("b/1.json"), "{}").unwrap();
        fs::write(dir.path().join("b/notes.txt"), "ignored").unwrap();

        let found: Vec<PathBuf> = discover(dir.path())
            .unwrap()
            .into_iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            found,
            vec![PathBuf::from("a.json"), PathBuf::from("b/1.json"), PathBuf::from("b/nested/2.json")]
        );
    }

    #[test]
    fn missing_fields_are_corpus_errors() {
        let dir = tempdir().unwrap();
        let ok = dir.path().join("ok.json");
        let missing = dir.path().join("missing.json");
        let broken = dir.path().join("broken.json");
        fs::write(&ok, r#"{"url":"http://x","content":"<p>hi</p>","encoding":"utf-8"}"#).unwrap();
        fs::write(&missing, r#"{"url":"http://x"}"#).unwrap();
        fs::write(&broken, "{not json").unwrap();

        assert_eq!(read_document(&ok).unwrap().url, "http://x");
        assert!(matches!(read_document(&missing), Err(IndexError::Corpus { .. })));
        assert!(matches!(read_document(&broken), Err(IndexError::Corpus { .. })));
        assert!(matches!(discover(&ok), Err(IndexError::Corpus { .. })));
    }
}
