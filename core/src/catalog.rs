//! Catalog rows and the sources that load them.
//!
//! A row's identity is its position in the loaded sequence. Names need not
//! be unique. Missing or empty `price`, `store` and `brand` cells load as
//! `None`; only structural problems (unreadable file, bad syntax, no `name`
//! column) are errors.

use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub name: String,
    pub price: Option<f64>,
    pub store: Option<String>,
    pub brand: Option<String>,
}

impl CatalogItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), price: None, store: None, brand: None }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_store(mut self, store: impl Into<String>) -> Self {
        self.store = Some(store.into());
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }
}

/// Anything that can produce the full catalog in a stable order.
pub trait CatalogSource: Send + Sync {
    fn load(&self) -> Result<Vec<CatalogItem>, CatalogError>;

    /// Short human-readable description used in logs.
    fn describe(&self) -> String;
}

/// In-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog(pub Vec<CatalogItem>);

impl CatalogSource for StaticCatalog {
    fn load(&self) -> Result<Vec<CatalogItem>, CatalogError> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        format!("static catalog ({} items)", self.0.len())
    }
}

/// CSV with a header row. `name` is required; `price`, `store` and `brand`
/// are picked up when present. Header matching ignores case.
#[derive(Debug, Clone)]
pub struct CsvCatalog {
    path: PathBuf,
    /// In-memory contents; `path` then only names the data in errors and logs.
    bytes: Option<Vec<u8>>,
}

impl CsvCatalog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf(), bytes: None }
    }

    /// CSV already in memory, e.g. an uploaded file. `name` is the file name used in messages.
    pub fn from_bytes<P: AsRef<Path>>(name: P, bytes: Vec<u8>) -> Self {
        Self { path: name.as_ref().to_path_buf(), bytes: Some(bytes) }
    }
}

impl CatalogSource for CsvCatalog {
    fn load(&self) -> Result<Vec<CatalogItem>, CatalogError> {
        if let Some(bytes) = &self.bytes {
            return read_csv(&self.path, bytes.as_slice());
        }
        let file = File::open(&self.path).map_err(|source| CatalogError::Io { path: self.path.clone(), source })?;
        read_csv(&self.path, file)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

fn read_csv<R: std::io::Read>(path: &Path, reader: R) -> Result<Vec<CatalogItem>, CatalogError> {
    let csv_err = |source| CatalogError::Csv { path: path.to_path_buf(), source };
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers().map_err(csv_err)?.clone();
    let column = |wanted: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(wanted));
    let name_col = column("name").ok_or_else(|| CatalogError::MissingNameColumn { path: path.to_path_buf() })?;
    let price_col = column("price");
    let store_col = column("store");
    let brand_col = column("brand");

    let mut items = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(csv_err)?;
        let cell = |col: Option<usize>| col.and_then(|c| record.get(c)).and_then(non_empty);
        items.push(CatalogItem {
            name: record.get(name_col).unwrap_or_default().to_string(),
            price: cell(price_col).and_then(|raw| parse_price(&raw)),
            store: cell(store_col),
            brand: cell(brand_col),
        });
    }
    Ok(items)
}

/// JSON array (or single object) for `.json`, one object per line for `.jsonl`.
#[derive(Debug, Clone)]
pub struct JsonCatalog {
    path: PathBuf,
}

impl JsonCatalog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    fn is_lines(&self) -> bool {
        extension(&self.path).as_deref() == Some("jsonl")
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonPrice {
    Number(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct JsonItem {
    name: String,
    #[serde(default)]
    price: Option<JsonPrice>,
    #[serde(default)]
    store: Option<String>,
    #[serde(default)]
    brand: Option<String>,
}

impl From<JsonItem> for CatalogItem {
    fn from(item: JsonItem) -> Self {
        let price = match item.price {
            Some(JsonPrice::Number(p)) if p.is_finite() => Some(p),
            Some(JsonPrice::Text(raw)) => parse_price(&raw),
            _ => None,
        };
        CatalogItem {
            name: item.name,
            price,
            store: item.store.as_deref().and_then(non_empty),
            brand: item.brand.as_deref().and_then(non_empty),
        }
    }
}

impl CatalogSource for JsonCatalog {
    fn load(&self) -> Result<Vec<CatalogItem>, CatalogError> {
        let io_err = |source| CatalogError::Io { path: self.path.clone(), source };
        let reader = BufReader::new(File::open(&self.path).map_err(io_err)?);

        if self.is_lines() {
            let mut items = Vec::new();
            for (i, line) in reader.lines().enumerate() {
                let line = line.map_err(io_err)?;
                if line.trim().is_empty() { continue; }
                let item: JsonItem = serde_json::from_str(&line)
                    .map_err(|source| CatalogError::JsonLine { path: self.path.clone(), line: i + 1, source })?;
                items.push(item.into());
            }
            return Ok(items);
        }

        let json_err = |source| CatalogError::Json { path: self.path.clone(), source };
        let json: serde_json::Value = serde_json::from_reader(reader).map_err(json_err)?;
        match json {
            serde_json::Value::Array(arr) => arr
                .into_iter()
                .map(|v| serde_json::from_value::<JsonItem>(v).map(CatalogItem::from).map_err(json_err))
                .collect(),
            other => {
                let item: JsonItem = serde_json::from_value(other).map_err(json_err)?;
                Ok(vec![item.into()])
            }
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// A catalog file chosen by extension, or a directory of them.
///
/// Directories are walked recursively and files are read in sorted path
/// order, so row positions are the same on every load.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path { &self.path }

    fn load_file(path: &Path) -> Result<Vec<CatalogItem>, CatalogError> {
        match extension(path).as_deref() {
            Some("csv") => CsvCatalog::new(path).load(),
            Some("json") | Some("jsonl") => JsonCatalog::new(path).load(),
            _ => Err(CatalogError::UnsupportedFormat { path: path.to_path_buf() }),
        }
    }
}

impl CatalogSource for FileCatalog {
    fn load(&self) -> Result<Vec<CatalogItem>, CatalogError> {
        if !self.path.is_dir() {
            return Self::load_file(&self.path);
        }
        let mut items = Vec::new();
        for entry in WalkDir::new(&self.path).sort_by_file_name() {
            let entry = entry.map_err(|e| CatalogError::Io {
                path: e.path().map(Path::to_path_buf).unwrap_or_else(|| self.path.clone()),
                source: e.into(),
            })?;
            let p = entry.path();
            if !entry.file_type().is_file() { continue; }
            if matches!(extension(p).as_deref(), Some("csv" | "json" | "jsonl")) {
                let loaded = Self::load_file(p)?;
                tracing::debug!(file = %p.display(), rows = loaded.len(), "loaded catalog file");
                items.extend(loaded);
            }
        }
        Ok(items)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension().and_then(|s| s.to_str()).map(str::to_ascii_lowercase)
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() { None } else { Some(t.to_string()) }
}

/// Parses a price cell such as `2.49`, `$2.49` or `€ 3`. Unparseable values
/// are dropped with a warning; they never fail the load.
pub fn parse_price(raw: &str) -> Option<f64> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    let digits = t.trim_start_matches(['$', '€', '£']).trim();
    match digits.parse::<f64>() {
        Ok(p) if p.is_finite() => Some(p),
        _ => {
            tracing::warn!(price = raw, "ignoring unparseable price");
            None
        }
    }
}
