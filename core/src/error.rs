//! Error types shared by index construction and query processing.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A corpus document could not be read or is missing required fields.
    #[error("corpus error in {path}: {reason}")]
    Corpus { path: PathBuf, reason: String },

    /// A block or merged-index line does not match the record schema.
    #[error("parse error in {path} line {line}: {reason}")]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// Metadata and merged index do not belong to the same build.
    #[error("index inconsistent: {0}")]
    Inconsistent(String),

    /// Structurally impossible on-disk content (df = 0, duplicate doc ids).
    #[error("index corrupt: {0}")]
    Corrupt(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("metadata encoding error: {0}")]
    Metadata(#[from] bincode::Error),
}

impl IndexError {
    pub fn corpus(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        IndexError::Corpus {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(path: impl Into<PathBuf>, line: usize, reason: impl ToString) -> Self {
        IndexError::Parse {
            path: path.into(),
            line,
            reason: reason.to_string(),
        }
    }

    /// True for failures that mean the on-disk index cannot be trusted, as
    /// opposed to transient I/O problems.
    pub fn is_index_state(&self) -> bool {
        matches!(
            self,
            IndexError::Inconsistent(_) | IndexError::Corrupt(_) | IndexError::Parse { .. }
        )
    }
}
