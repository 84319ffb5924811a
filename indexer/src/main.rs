use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use dealify_core::{Analyzer, FileCatalog, SearchEngine, DEFAULT_K};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build a BM25 index over a product catalog and query it", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CatalogArgs {
    /// Catalog file (.csv, .json, .jsonl) or directory of them
    #[arg(long)]
    catalog: PathBuf,
    /// Stem names and queries (Snowball English)
    #[arg(long, default_value_t = false)]
    stem: bool,
    /// Drop English stop words
    #[arg(long, default_value_t = false)]
    stopwords: bool,
}

impl CatalogArgs {
    fn engine(&self) -> Result<SearchEngine> {
        let source = FileCatalog::new(&self.catalog);
        Ok(SearchEngine::from_source(&source, Analyzer::new(self.stem, self.stopwords))?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index and print its statistics as JSON
    Stats {
        #[command(flatten)]
        catalog: CatalogArgs,
    },
    /// Rank catalog items against a query and print the results as JSON
    Search {
        #[command(flatten)]
        catalog: CatalogArgs,
        /// Free-text query, e.g. a product name read off a label
        #[arg(long)]
        query: String,
        /// Number of results
        #[arg(short, long, default_value_t = DEFAULT_K)]
        k: usize,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Stats { catalog } => {
            let engine = catalog.engine()?;
            println!("{}", serde_json::to_string_pretty(&engine.stats())?);
        }
        Commands::Search { catalog, query, k } => {
            let engine = catalog.engine()?;
            let results = engine.search_by_text(&query, k);
            tracing::info!(query = %query, hits = results.len(), "search complete");
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }
    Ok(())
}
