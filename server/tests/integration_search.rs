use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use dealify_core::{
    Analyzer, CatalogError, CatalogItem, CatalogSource, ExtractionError, LabelImage, SearchEngine, StaticCatalog,
    TextExtractor,
};
use http_body_util::BodyExt;
use serde_json::Value;
use server::{router, AppState, ServerConfig};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::tempdir;
use tower::ServiceExt;

/// Lets a test flip a catalog source between healthy and broken.
#[derive(Default)]
struct Flag(AtomicBool);

impl Flag {
    fn set(&self, v: bool) { self.0.store(v, Ordering::SeqCst) }
    fn get(&self) -> bool { self.0.load(Ordering::SeqCst) }
}

struct FixedLabel(&'static str);

#[async_trait]
impl TextExtractor for FixedLabel {
    async fn extract(&self, image: &LabelImage) -> Result<String, ExtractionError> {
        if image.bytes.is_empty() {
            return Err(ExtractionError::InvalidImage);
        }
        Ok(self.0.to_string())
    }
}

struct FailingLabel;

#[async_trait]
impl TextExtractor for FailingLabel {
    async fn extract(&self, _image: &LabelImage) -> Result<String, ExtractionError> {
        Err(ExtractionError::Status { status: 500, body: "upstream down".into() })
    }
}

struct Switchable {
    items: Vec<CatalogItem>,
    broken: Arc<Flag>,
}

impl CatalogSource for Switchable {
    fn load(&self) -> Result<Vec<CatalogItem>, CatalogError> {
        if self.broken.get() {
            return Err(CatalogError::MissingNameColumn { path: "catalog.csv".into() });
        }
        Ok(self.items.clone())
    }

    fn describe(&self) -> String { "switchable".into() }
}

fn groceries() -> Vec<CatalogItem> {
    vec![
        CatalogItem::new("green apple").with_price(1.25).with_store("Metro"),
        CatalogItem::new("red apple").with_store("IGA"),
        CatalogItem::new("white bread").with_price(2.99),
    ]
}

fn app_with(catalog: Arc<dyn CatalogSource>, extractor: Option<Arc<dyn TextExtractor>>) -> Router {
    let engine = SearchEngine::from_source(catalog.as_ref(), Analyzer::default()).unwrap();
    router(AppState {
        engine: Arc::new(engine),
        catalog,
        extractor,
        admin_token: Some("secret".into()),
        max_k: 100,
    })
}

fn app() -> Router {
    app_with(Arc::new(StaticCatalog(groceries())), Some(Arc::new(FixedLabel("green apple"))))
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

fn multipart_body(field: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!("--XBOUNDARY\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(b"\r\n--XBOUNDARY--\r\n");
    body
}

fn multipart(field: &str, bytes: &[u8]) -> Request<Body> {
    Request::post("/upload")
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
        .body(Body::from(multipart_body(field, "label.jpg", "image/jpeg", bytes)))
        .unwrap()
}

fn catalog_upload(file_name: &str, csv: &str) -> Request<Body> {
    Request::post("/items/upload")
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
        .header("X-ADMIN-TOKEN", "secret")
        .body(Body::from(multipart_body("file", file_name, "text/csv", csv.as_bytes())))
        .unwrap()
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let (status, json) = get(app(), "/search?q=apple&k=2").await;
    assert_eq!(status, StatusCode::OK);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["rank"], 1);
    assert_eq!(arr[0]["text"], "green apple");
    assert_eq!(arr[0]["price"], 1.25);
    assert_eq!(arr[0]["store"], "Metro");
    assert_eq!(arr[1]["rank"], 2);
    assert_eq!(arr[1]["text"], "red apple");
    assert!(arr[1]["price"].is_null());
}

#[tokio::test]
async fn search_non_positive_k_is_empty() {
    let (status, json) = get(app(), "/search?q=apple&k=-1").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn search_defaults_to_all_when_catalog_is_small() {
    let (_, json) = get(app(), "/search?q=").await;
    let texts: Vec<&str> = json["results"].as_array().unwrap().iter().map(|r| r["text"].as_str().unwrap()).collect();
    assert_eq!(texts, vec!["green apple", "red apple", "white bread"]);
}

#[tokio::test]
async fn upload_extracts_label_then_searches() {
    let (status, json) = send(app(), multipart("image", b"\xff\xd8\xff fake jpeg")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Search term generated");
    assert_eq!(json["term"], "green apple");
    assert_eq!(json["results"][0]["text"], "green apple");
}

#[tokio::test]
async fn upload_without_image_is_bad_request() {
    let (status, json) = send(app(), multipart("document", b"hello")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No image file uploaded");
}

#[tokio::test]
async fn upload_without_extractor_is_unavailable() {
    let app = app_with(Arc::new(StaticCatalog(groceries())), None);
    let (status, _) = send(app, multipart("image", b"jpeg")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn upload_extractor_failure_is_bad_gateway() {
    let app = app_with(Arc::new(StaticCatalog(groceries())), Some(Arc::new(FailingLabel)));
    let (status, _) = send(app, multipart("image", b"jpeg")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn items_listing_and_lookup() {
    let (status, json) = get(app(), "/items").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 3);

    let (status, json) = get(app(), "/items/white%20bread").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["price"], 2.99);

    let (status, _) = get(app(), "/items/durian").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reload_requires_admin_token() {
    let req = Request::post("/admin/reload").body(Body::empty()).unwrap();
    let (status, _) = send(app(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn failed_reload_keeps_serving_old_snapshot() {
    let broken = Arc::new(Flag::default());
    let app = app_with(Arc::new(Switchable { items: groceries(), broken: broken.clone() }), None);
    let (_, before) = get(app.clone(), "/search?q=apple").await;

    broken.set(true);
    let req = Request::post("/admin/reload").header("X-ADMIN-TOKEN", "secret").body(Body::empty()).unwrap();
    let (status, json) = send(app.clone(), req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().unwrap().contains("name"));

    let (_, after) = get(app.clone(), "/search?q=apple").await;
    assert_eq!(before["results"], after["results"]);

    broken.set(false);
    let req = Request::post("/admin/reload").header("X-ADMIN-TOKEN", "secret").body(Body::empty()).unwrap();
    let (status, json) = send(app.clone(), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["generation"], 2);
    assert_eq!(json["num_docs"], 3);
}

#[tokio::test]
async fn build_app_loads_csv_catalog() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("supermarkets.csv");
    fs::write(&path, "name,brand,price,store\nwhole milk,Natrel,4.49,Metro\nchocolate milk,,,\nsourdough bread,,5.00,IGA\n").unwrap();
    let config = ServerConfig { catalog: path, analyzer: Analyzer::default(), max_k: 100, admin_token: None };
    let app = server::build_app(config, None).unwrap();

    let (status, json) = get(app.clone(), "/search?q=milk&k=5").await;
    assert_eq!(status, StatusCode::OK);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 3);
    assert_eq!(arr[0]["text"], "whole milk");
    assert_eq!(arr[1]["text"], "chocolate milk");
    assert!(arr[1]["store"].is_null());

    let (_, stats) = get(app, "/stats").await;
    assert_eq!(stats["num_docs"], 3);
    assert_eq!(stats["generation"], 1);
}

#[tokio::test]
async fn build_app_fails_on_missing_catalog() {
    let dir = tempdir().unwrap();
    let config = ServerConfig { catalog: dir.path().join("missing.csv"), analyzer: Analyzer::default(), max_k: 10, admin_token: None };
    assert!(server::build_app(config, None).is_err());
}

#[tokio::test]
async fn catalog_upload_swaps_results() {
    let app = app();
    let (status, json) = send(app.clone(), catalog_upload("supermarkets.csv", "name,price,store\noat milk,3.49,Metro\nwhole milk,4.49,IGA\n")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["num_docs"], 2);
    assert_eq!(json["generation"], 2);

    let (_, json) = get(app.clone(), "/search?q=milk").await;
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["text"], "oat milk");
    assert_eq!(arr[0]["price"], 3.49);

    let (_, json) = get(app, "/search?q=apple").await;
    assert!(json["results"].as_array().unwrap().iter().all(|r| r["text"] != "green apple"));
}

#[tokio::test]
async fn catalog_upload_rejects_non_csv() {
    let (status, json) = send(app(), catalog_upload("items.xlsx", "name\nmilk\n")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Only CSV files are allowed!");
}

#[tokio::test]
async fn catalog_upload_requires_admin_token() {
    let req = Request::post("/items/upload")
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
        .body(Body::from(multipart_body("file", "a.csv", "text/csv", b"name\nmilk\n")))
        .unwrap();
    let (status, _) = send(app(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_catalog_upload_keeps_old_snapshot() {
    let app = app();
    let (_, before) = get(app.clone(), "/search?q=apple").await;

    let (status, json) = send(app.clone(), catalog_upload("broken.csv", "title,price\nmilk,1\n")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("name"));

    let (_, after) = get(app.clone(), "/search?q=apple").await;
    assert_eq!(before["results"], after["results"]);
    let (_, stats) = get(app, "/stats").await;
    assert_eq!(stats["generation"], 1);
}
