//! Boundary to the image-to-label step. The ranking code never sees images,
//! only the text an extractor returns.

use crate::error::ExtractionError;
use async_trait::async_trait;

/// Raw bytes of an uploaded product-label photo.
#[derive(Debug, Clone)]
pub struct LabelImage {
    pub bytes: Vec<u8>,
    /// MIME type as reported by the uploader, e.g. `image/png`.
    pub content_type: Option<String>,
}

impl LabelImage {
    pub fn new(bytes: Vec<u8>, content_type: Option<String>) -> Self {
        Self { bytes, content_type }
    }

    /// MIME type to declare downstream, `image/jpeg` when unknown.
    pub fn mime(&self) -> &str {
        self.content_type
            .as_deref()
            .filter(|ct| ct.starts_with("image/"))
            .unwrap_or("image/jpeg")
    }
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Returns a short normalized product name for the image.
    async fn extract(&self, image: &LabelImage) -> Result<String, ExtractionError>;
}

/// Strips spaces, dots and double quotes from both ends and lowercases.
pub fn normalize_label(raw: &str) -> String {
    raw.trim_matches(|c: char| c.is_whitespace() || c == '.' || c == '"').to_lowercase()
}
