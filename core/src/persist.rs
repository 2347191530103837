use crate::error::{IndexError, Result};
use crate::DocId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, create_dir_all, File};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

pub const METADATA_VERSION: u32 = 1;

/// Everything the query side needs besides the merged index itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub version: u32,
    pub created_at: String,
    pub total_docs: u32,
    pub doc_urls: BTreeMap<DocId, String>,
    /// term -> byte offset of its line in the merged index
    pub directory: HashMap<String, u64>,
    pub index_len: u64,
    pub index_crc32: u32,
}

#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn blocks_dir(&self) -> PathBuf { self.root.join("blocks") }
    pub fn runs_dir(&self) -> PathBuf { self.root.join("runs") }
    pub fn index_file(&self) -> PathBuf { self.root.join("index.jsonl") }
    pub fn metadata_file(&self) -> PathBuf { self.root.join("metadata.bin") }

    pub fn block_file(&self, seq: usize) -> PathBuf {
        self.blocks_dir().join(format!("block-{seq:06}.jsonl"))
    }
    pub fn run_file(&self, pass: usize, seq: usize) -> PathBuf {
        self.runs_dir().join(format!("run-{pass:02}-{seq:06}.jsonl"))
    }
}

/// Path a file is staged under before being renamed into place.
pub fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Remove every file of the previous generation and recreate an empty root.
pub fn reset_index_storage(paths: &IndexPaths) -> Result<()> {
    if paths.root.exists() {
        fs::remove_dir_all(&paths.root)?;
    }
    create_dir_all(&paths.root)?;
    tracing::info!(root = %paths.root.display(), "index storage reset");
    Ok(())
}

pub fn save_metadata(paths: &IndexPaths, meta: &Metadata) -> Result<()> {
    create_dir_all(&paths.root)?;
    let target = paths.metadata_file();
    let staging = staging_path(&target);
    let bytes = bincode::serialize(meta)?;
    let mut f = File::create(&staging)?;
    f.write_all(&bytes)?;
    f.sync_all()?;
    fs::rename(&staging, &target)?;
    Ok(())
}

pub fn load_metadata(paths: &IndexPaths) -> Result<Metadata> {
    let path = paths.metadata_file();
    let mut f = File::open(&path).map_err(|e| {
        IndexError::Inconsistent(format!("cannot open metadata {}: {e}", path.display()))
    })?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let meta: Metadata = bincode::deserialize(&buf)?;
    if meta.version != METADATA_VERSION {
        return Err(IndexError::Inconsistent(format!(
            "metadata version {} is not {METADATA_VERSION}",
            meta.version
        )));
    }
    Ok(meta)
}

/// Length and CRC-32 of a file, read in chunks.
pub fn file_fingerprint(path: &Path) -> Result<(u64, u32)> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = [0u8; 64 * 1024];
    let mut len = 0u64;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        len += n as u64;
    }
    Ok((len, hasher.finalize()))
}

/// Check that the merged index on disk is the one `meta` was written for.
pub fn verify_index(paths: &IndexPaths, meta: &Metadata) -> Result<()> {
    let path = paths.index_file();
    if !path.is_file() {
        return Err(IndexError::Inconsistent(format!("merged index {} is missing", path.display())));
    }
    let (len, crc) = file_fingerprint(&path)?;
    if len != meta.index_len || crc != meta.index_crc32 {
        return Err(IndexError::Inconsistent(format!(
            "merged index does not match metadata (len {len} vs {}, crc {crc:08x} vs {:08x})",
            meta.index_len, meta.index_crc32
        )));
    }
    Ok(())
}

pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
