use anyhow::{anyhow, Result};
use clap::Parser;
use dealify_core::{LabelImage, TextExtractor};
use labeler::{LabelerConfig, OpenAiLabeler, DEFAULT_MODEL};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "labeler")]
#[command(about = "Extract a normalized product name from a label photo")]
struct Cli {
    /// Image file to label
    image: String,
    /// Vision model name
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,
    /// Override the API base URL (otherwise OPENAI_BASE_URL or the OpenAI default)
    #[arg(long)]
    api_base: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Cli::parse();

    let mut config = LabelerConfig::from_env()?;
    config.model = args.model;
    if let Some(base) = args.api_base {
        config.api_base = base;
    }

    let bytes = tokio::fs::read(&args.image).await.map_err(|e| anyhow!("cannot read {}: {e}", args.image))?;
    let content_type = match args.image.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("png") => Some("image/png".to_string()),
        Some("webp") => Some("image/webp".to_string()),
        Some("gif") => Some("image/gif".to_string()),
        _ => None,
    };

    let labeler = OpenAiLabeler::new(config)?;
    let term = labeler.extract(&LabelImage::new(bytes, content_type)).await?;
    println!("{term}");
    Ok(())
}
