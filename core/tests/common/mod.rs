#![allow(dead_code)]

use blockdex_core::{build_index, BuildConfig, BuildReport, IndexPaths, Searcher};
use std::fs;
use std::path::Path;

/// Write one corpus document per page, named so traversal order matches
/// the slice order.
pub fn write_corpus(root: &Path, pages: &[&str]) {
    fs::create_dir_all(root).unwrap();
    for (i, html) in pages.iter().enumerate() {
        let doc = serde_json::json!({
            "url": format!("https://example.com/{}", i + 1),
            "content": html,
        });
        fs::write(root.join(format!("doc-{:03}.json", i + 1)), doc.to_string()).unwrap();
    }
}

pub fn build(index: &Path, corpus: &Path, block_size: usize) -> (BuildReport, Searcher) {
    let paths = IndexPaths::new(index);
    let config = BuildConfig { block_size, ..Default::default() };
    let report = build_index(&paths, corpus, &config).unwrap();
    let searcher = Searcher::open(&paths).unwrap();
    (report, searcher)
}

pub fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-3
}
