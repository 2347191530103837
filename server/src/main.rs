use anyhow::{Context, Result};
use clap::Parser;
use server::{build_app_with, ServerOptions};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "server", about = "Serve queries over a built index")]
struct Args {
    /// Directory written by `indexer build`
    #[arg(long, default_value = "./index")]
    index: PathBuf,
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: SocketAddr,
    /// Token that unlocks POST /index/reload
    #[arg(long, env = "ADMIN_TOKEN", hide_env_values = true)]
    admin_token: Option<String>,
    /// Allowed CORS origins, comma separated; any origin when empty
    #[arg(long = "cors-origin", env = "CORS_ALLOW_ORIGIN", value_delimiter = ',')]
    cors_origins: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let options = ServerOptions { admin_token: args.admin_token, allowed_origins: args.cors_origins };
    let app = build_app_with(&args.index, options)
        .with_context(|| format!("opening index {}", args.index.display()))?;

    let listener = TcpListener::bind(args.listen).await?;
    tracing::info!(addr = %args.listen, index = %args.index.display(), "serving queries");
    axum::serve(listener, app).await?;
    Ok(())
}
