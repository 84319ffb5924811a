//! Product-label recognition through an OpenAI-compatible vision model.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use dealify_core::{normalize_label, ExtractionError, LabelImage, TextExtractor};
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";

const SYSTEM_PROMPT: &str = "You are an AI that extracts product names from labels.";
const USER_PROMPT: &str = "Extract the product name from the label. No punctuation. Only the product name. \
In lowercase. I don't want any abbreviations. For example a label with gr. apple should be green apple. \
No brand name. If the label isn't in English, translate to english";

#[derive(Debug, Clone)]
pub struct LabelerConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout: Duration,
}

impl LabelerConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 10,
            temperature: 0.1,
            timeout: Duration::from_secs(30),
        }
    }

    /// Reads `OPENAI_API_KEY` and, if set, `OPENAI_BASE_URL`.
    pub fn from_env() -> Result<Self, ExtractionError> {
        let key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty());
        let mut cfg = Self::new(key.ok_or(ExtractionError::MissingApiKey)?);
        if let Ok(base) = std::env::var("OPENAI_BASE_URL") {
            cfg.api_base = base;
        }
        Ok(cfg)
    }
}

pub struct OpenAiLabeler {
    client: Client,
    config: LabelerConfig,
}

impl OpenAiLabeler {
    pub fn new(config: LabelerConfig) -> Result<Self, ExtractionError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExtractionError::Request(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &LabelerConfig { &self.config }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'))
    }
}

/// Chat-completions payload carrying the image inline as a base64 data URL.
pub fn request_body(config: &LabelerConfig, image: &LabelImage) -> Value {
    let data_url = format!("data:{};base64,{}", image.mime(), STANDARD.encode(&image.bytes));
    json!({
        "model": config.model,
        "messages": [
            { "role": "system", "content": SYSTEM_PROMPT },
            {
                "role": "user",
                "content": [
                    { "type": "text", "text": USER_PROMPT },
                    { "type": "image_url", "image_url": { "url": data_url, "detail": "high" } }
                ]
            }
        ],
        "max_tokens": config.max_tokens,
        "temperature": config.temperature,
    })
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Pulls the first answer out of a chat-completions response and normalizes it.
pub fn parse_answer(body: &str) -> Result<String, ExtractionError> {
    let resp: ChatResponse = serde_json::from_str(body).map_err(|e| ExtractionError::Request(format!("bad response body: {e}")))?;
    let label = resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|content| normalize_label(&content))
        .unwrap_or_default();
    if label.is_empty() {
        return Err(ExtractionError::EmptyLabel);
    }
    Ok(label)
}

#[async_trait]
impl TextExtractor for OpenAiLabeler {
    async fn extract(&self, image: &LabelImage) -> Result<String, ExtractionError> {
        if image.bytes.is_empty() {
            return Err(ExtractionError::InvalidImage);
        }
        let resp = self
            .client
            .post(self.endpoint())
            .header(header::AUTHORIZATION, format!("Bearer {}", self.config.api_key))
            .json(&request_body(&self.config, image))
            .send()
            .await
            .map_err(|e| ExtractionError::Request(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| ExtractionError::Request(e.to_string()))?;
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "vision model rejected request");
            return Err(ExtractionError::Status { status: status.as_u16(), body });
        }
        let label = parse_answer(&body)?;
        tracing::info!(label = %label, bytes = image.bytes.len(), "label extracted");
        Ok(label)
    }
}
