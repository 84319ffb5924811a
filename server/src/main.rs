use anyhow::Result;
use axum::Router;
use clap::Parser;
use dealify_core::{Analyzer, TextExtractor};
use labeler::{LabelerConfig, OpenAiLabeler, DEFAULT_MODEL};
use server::{build_app, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Catalog file (.csv, .json, .jsonl) or directory of them
    #[arg(long, default_value = "./catalog.csv")]
    catalog: PathBuf,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Largest number of results a single request may ask for
    #[arg(long, default_value_t = 100)]
    max_k: usize,
    /// Stem catalog names and queries (Snowball English)
    #[arg(long, default_value_t = false)]
    stem: bool,
    /// Drop English stop words from catalog names and queries
    #[arg(long, default_value_t = false)]
    stopwords: bool,
    /// Vision model used by /upload
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,
    /// Override the vision API base URL
    #[arg(long)]
    api_base: Option<String>,
}

fn extractor(args: &Args) -> Option<Arc<dyn TextExtractor>> {
    let mut config = match LabelerConfig::from_env() {
        Ok(c) => c,
        Err(err) => {
            tracing::warn!(%err, "image upload disabled");
            return None;
        }
    };
    config.model = args.model.clone();
    if let Some(base) = &args.api_base {
        config.api_base = base.clone();
    }
    match OpenAiLabeler::new(config) {
        Ok(l) => Some(Arc::new(l)),
        Err(err) => {
            tracing::warn!(%err, "image upload disabled");
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let config = ServerConfig {
        catalog: args.catalog.clone(),
        analyzer: Analyzer::new(args.stem, args.stopwords),
        max_k: args.max_k,
        admin_token: std::env::var("ADMIN_TOKEN").ok(),
    };
    let app: Router = build_app(config, extractor(&args))?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, catalog = %args.catalog.display(), "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
