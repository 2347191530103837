use anyhow::{Context, Result};
use blockdex_core::{
    build_index, reset_index_storage, BuildConfig, IndexPaths, SearchConfig, Searcher, UnknownTermPolicy,
};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query a block-merged inverted index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove every file of the current index generation
    Reset {
        /// Index directory
        #[arg(long, default_value = "./index")]
        output: PathBuf,
    },
    /// Build the index from a directory of crawled JSON documents
    Build {
        /// Corpus root, searched recursively for *.json documents
        #[arg(long)]
        input: PathBuf,
        /// Index directory (its previous contents are discarded)
        #[arg(long, default_value = "./index")]
        output: PathBuf,
        /// JSON file with build settings; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,
        /// Documents per block before flushing to disk
        #[arg(long)]
        block_size: Option<usize>,
        /// Most block files merged at once
        #[arg(long)]
        max_fan_in: Option<usize>,
        /// Abort on the first unreadable document
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
    /// Run a query against a built index and print matching urls
    Search {
        /// Index directory
        #[arg(long, default_value = "./index")]
        index: PathBuf,
        /// Maximum number of results to print
        #[arg(long, default_value_t = 10)]
        k: usize,
        /// Return nothing when any query term is not in the index
        #[arg(long, default_value_t = false)]
        require_all: bool,
        /// Query text
        query: Vec<String>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Reset { output } => {
            reset_index_storage(&IndexPaths::new(&output))?;
            Ok(())
        }
        Commands::Build { input, output, config, block_size, max_fan_in, strict } => {
            let mut settings = match config {
                Some(path) => {
                    let raw = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
                    serde_json::from_str::<BuildConfig>(&raw).with_context(|| format!("parsing {}", path.display()))?
                }
                None => BuildConfig::default(),
            };
            if let Some(n) = block_size {
                settings.block_size = n;
            }
            if let Some(n) = max_fan_in {
                settings.max_fan_in = n;
            }
            settings.strict |= strict;
            run_build(&input, &output, &settings)
        }
        Commands::Search { index, k, require_all, query } => {
            let policy = if require_all { UnknownTermPolicy::RequireAll } else { UnknownTermPolicy::Ignore };
            run_search(&index, &query.join(" "), k, SearchConfig { unknown_terms: policy })
        }
    }
}

fn run_build(input: &Path, output: &Path, settings: &BuildConfig) -> Result<()> {
    let paths = IndexPaths::new(output);
    let report = build_index(&paths, input, settings)
        .with_context(|| format!("building index from {}", input.display()))?;
    for skipped in &report.skipped {
        tracing::warn!(path = %skipped.path.display(), reason = %skipped.reason, "document skipped");
    }
    tracing::info!(
        docs = report.total_docs,
        terms = report.terms,
        blocks = report.blocks,
        passes = report.merge_passes,
        skipped = report.skipped.len(),
        output = %output.display(),
        "wrote index"
    );
    Ok(())
}

fn run_search(index: &Path, query: &str, k: usize, config: SearchConfig) -> Result<()> {
    let searcher = Searcher::open_with(&IndexPaths::new(index), config)
        .with_context(|| format!("opening index {}", index.display()))?;
    let ranked = searcher.search_scored(query)?;
    println!("{} results for {:?}", ranked.len(), query);
    for hit in ranked.iter().take(k) {
        let url = searcher.url(hit.doc_id).unwrap_or("<unknown>");
        println!("{:>4}  {:.4}  {}", hit.doc_id, hit.score, url);
    }
    Ok(())
}
