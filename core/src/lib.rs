//! Lexical product search over a static grocery catalog.
//!
//! Catalog names are tokenized once into a [`Bm25Index`]; queries (free text
//! or a label extracted from a photo) are scored with Okapi BM25, ranked with
//! a deterministic tie-break on catalog position and joined back to price and
//! store.

pub mod catalog;
pub mod engine;
pub mod error;
pub mod extract;
pub mod index;
pub mod scorer;
pub mod tokenizer;

pub use catalog::{CatalogItem, CatalogSource, CsvCatalog, FileCatalog, JsonCatalog, StaticCatalog};
pub use engine::{IndexStats, SearchEngine, Snapshot};
pub use error::{CatalogError, ExtractionError};
pub use extract::{normalize_label, LabelImage, TextExtractor};
pub use index::{Bm25Index, DocId};
pub use scorer::{Bm25Params, RankedResult, DEFAULT_K};
pub use tokenizer::Analyzer;
