pub mod errors;

use anyhow::Result;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use dealify_core::{
    Analyzer, CatalogItem, CatalogSource, CsvCatalog, FileCatalog, IndexStats, LabelImage, RankedResult, SearchEngine,
    TextExtractor, DEFAULT_K,
};
use errors::ApiError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Uploaded label photos larger than this are rejected.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Catalog file or directory, loaded at startup and on `/admin/reload`.
    pub catalog: PathBuf,
    pub analyzer: Analyzer,
    /// Upper bound applied to the `k` query parameter.
    pub max_k: usize,
    /// Required `X-ADMIN-TOKEN` value for admin routes; admin routes are closed when unset.
    pub admin_token: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_k")]
    pub k: i64,
}

#[derive(Deserialize)]
pub struct UploadParams {
    #[serde(default = "default_k")]
    pub k: i64,
}

fn default_k() -> i64 { DEFAULT_K as i64 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub results: Vec<RankedResult>,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub term: String,
    pub results: Vec<RankedResult>,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SearchEngine>,
    pub catalog: Arc<dyn CatalogSource>,
    pub extractor: Option<Arc<dyn TextExtractor>>,
    pub admin_token: Option<String>,
    pub max_k: usize,
}

/// Loads the catalog and wires the router. Fails if the initial load fails.
pub fn build_app(config: ServerConfig, extractor: Option<Arc<dyn TextExtractor>>) -> Result<Router> {
    let catalog: Arc<dyn CatalogSource> = Arc::new(FileCatalog::new(&config.catalog));
    let engine = SearchEngine::from_source(catalog.as_ref(), config.analyzer)?;
    let state = AppState {
        engine: Arc::new(engine),
        catalog,
        extractor,
        admin_token: config.admin_token,
        max_k: config.max_k,
    };
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/upload", post(upload_handler))
        .route("/items", get(items_handler))
        .route("/items/upload", post(catalog_upload_handler))
        .route("/items/:name", get(item_handler))
        .route("/stats", get(stats_handler))
        .route("/admin/reload", post(reload_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

// CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
fn cors_layer() -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                base.allow_origin(Any)
            } else {
                base.allow_origin(AllowOrigin::list(origins))
            }
        }
        Err(_) => base.allow_origin(Any),
    }
}

/// Negative `k` asks for nothing; large `k` is clamped to `max_k`.
fn effective_k(k: i64, max_k: usize) -> usize {
    usize::try_from(k).unwrap_or(0).min(max_k)
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let results = state.engine.search_by_text(&params.q, effective_k(params.k, state.max_k));
    Json(SearchResponse { query: params.q, took_s: start.elapsed().as_secs_f64(), results })
}

pub async fn upload_handler(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut image: Option<LabelImage> = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::BadRequest(e.to_string()))? {
        if !matches!(field.name(), Some("image") | Some("file")) { continue; }
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
        image = Some(LabelImage::new(bytes.to_vec(), content_type));
        break;
    }
    let image = image.ok_or_else(|| ApiError::BadRequest("No image file uploaded".into()))?;

    let extractor = state
        .extractor
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("image recognition is not configured".into()))?;
    let term = extractor.extract(&image).await?;
    tracing::info!(term = %term, "label recognized");

    let results = state.engine.search_by_text(&term, effective_k(params.k, state.max_k));
    Ok(Json(UploadResponse { message: "Search term generated".into(), term, results }))
}

pub async fn items_handler(State(state): State<AppState>) -> Json<Vec<CatalogItem>> {
    Json(state.engine.snapshot().items().to_vec())
}

pub async fn item_handler(State(state): State<AppState>, Path(name): Path<String>) -> Result<Json<CatalogItem>, ApiError> {
    state
        .engine
        .find_by_name(&name)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no item named {name:?}")))
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<IndexStats> {
    Json(state.engine.stats())
}

pub async fn reload_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<IndexStats>, ApiError> {
    authorize(&state, &headers)?;
    let engine = state.engine.clone();
    let catalog = state.catalog.clone();
    let outcome = tokio::task::spawn_blocking(move || engine.rebuild_index(catalog.as_ref()))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    outcome.map(Json).map_err(|e| ApiError::Internal(e.to_string()))
}

/// Replaces the served catalog with an uploaded CSV. A rejected upload leaves
/// the current snapshot in place.
pub async fn catalog_upload_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<IndexStats>, ApiError> {
    authorize(&state, &headers)?;
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::BadRequest(e.to_string()))? {
        if field.name() != Some("file") { continue; }
        let file_name = field.file_name().unwrap_or_default().to_string();
        if !file_name.to_ascii_lowercase().ends_with(".csv") {
            return Err(ApiError::BadRequest("Only CSV files are allowed!".into()));
        }
        let bytes = field.bytes().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
        upload = Some((file_name, bytes.to_vec()));
        break;
    }
    let (file_name, bytes) = upload.ok_or_else(|| ApiError::BadRequest("No file uploaded".into()))?;

    let engine = state.engine.clone();
    let source = CsvCatalog::from_bytes(&file_name, bytes);
    let outcome = tokio::task::spawn_blocking(move || engine.rebuild_index(&source))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let stats = outcome.map_err(|e| ApiError::BadRequest(e.to_string()))?;
    tracing::info!(file = %file_name, num_docs = stats.num_docs, "catalog uploaded");
    Ok(Json(stats))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err(ApiError::Unauthorized("ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("invalid admin token".into()))
    }
}
