use std::path::PathBuf;

/// Failure to produce a catalog. Surfaced by [`crate::SearchEngine::rebuild_index`];
/// the snapshot being served is left untouched.
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed CSV in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("malformed JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed JSON in {} at line {line}: {source}", path.display())]
    JsonLine {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("{} has no `name` column", path.display())]
    MissingNameColumn { path: PathBuf },
    #[error("unsupported catalog file {}: expected .csv, .json or .jsonl", path.display())]
    UnsupportedFormat { path: PathBuf },
}

/// Failure of the image-to-label step.
#[derive(thiserror::Error, Debug)]
pub enum ExtractionError {
    #[error("image is empty or unreadable")]
    InvalidImage,
    #[error("no API key configured for the vision model")]
    MissingApiKey,
    #[error("vision model request failed: {0}")]
    Request(String),
    #[error("vision model returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("vision model returned no product name")]
    EmptyLabel,
}
