//! The process-wide search handle.
//!
//! A [`Snapshot`] pairs the catalog rows with the index built from their
//! names. Snapshots are never mutated: [`SearchEngine::rebuild_index`] builds
//! a fresh one off to the side and swaps the pointer, so a query that already
//! holds the previous `Arc` finishes against it undisturbed.

use crate::catalog::{CatalogItem, CatalogSource};
use crate::error::CatalogError;
use crate::index::Bm25Index;
use crate::scorer::{enrich, rank, score, RankedResult};
use crate::tokenizer::Analyzer;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub num_docs: usize,
    pub num_terms: usize,
    pub avg_doc_len: f64,
    /// Incremented by every successful build; the initial empty snapshot is 0.
    pub generation: u64,
    pub built_at: String,
    pub analyzer: Analyzer,
}

/// Catalog rows plus the index over their names. Row `i` is document `i`.
#[derive(Debug)]
pub struct Snapshot {
    items: Vec<CatalogItem>,
    index: Bm25Index,
    analyzer: Analyzer,
    stats: IndexStats,
}

impl Snapshot {
    pub fn build(items: Vec<CatalogItem>, analyzer: Analyzer, generation: u64) -> Self {
        let docs: Vec<Vec<String>> = items.iter().map(|item| analyzer.tokenize(&item.name)).collect();
        let index = Bm25Index::build(&docs);
        debug_assert_eq!(index.num_docs(), items.len());
        let stats = IndexStats {
            num_docs: index.num_docs(),
            num_terms: index.num_terms(),
            avg_doc_len: index.avg_doc_len(),
            generation,
            built_at: time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
            analyzer,
        };
        Self { items, index, analyzer, stats }
    }

    pub fn items(&self) -> &[CatalogItem] { &self.items }

    pub fn index(&self) -> &Bm25Index { &self.index }

    pub fn stats(&self) -> &IndexStats { &self.stats }

    /// BM25 score of every row for `query`, in catalog order.
    pub fn scores(&self, query: &str) -> Vec<f64> {
        score(&self.analyzer.tokenize(query), &self.index)
    }

    pub fn search(&self, query: &str, k: usize) -> Vec<RankedResult> {
        let scores = self.scores(query);
        enrich(&rank(&scores, k), &self.items)
    }
}

pub struct SearchEngine {
    current: RwLock<Arc<Snapshot>>,
    analyzer: Analyzer,
    // Serializes rebuilds so generations are installed in order. Readers never touch it.
    rebuild: Mutex<u64>,
}

impl SearchEngine {
    /// An engine serving an empty catalog until the first rebuild.
    pub fn new(analyzer: Analyzer) -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::build(Vec::new(), analyzer, 0))),
            analyzer,
            rebuild: Mutex::new(0),
        }
    }

    pub fn from_source(source: &dyn CatalogSource, analyzer: Analyzer) -> Result<Self, CatalogError> {
        let engine = Self::new(analyzer);
        engine.rebuild_index(source)?;
        Ok(engine)
    }

    pub fn analyzer(&self) -> Analyzer { self.analyzer }

    /// The snapshot currently serving queries.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    /// Top `k` catalog rows for `query`. Empty for `k == 0` or an empty catalog.
    pub fn search_by_text(&self, query: &str, k: usize) -> Vec<RankedResult> {
        let snapshot = self.snapshot();
        let results = snapshot.search(query, k);
        tracing::debug!(query, k, hits = results.len(), generation = snapshot.stats.generation, "search");
        results
    }

    /// Loads `source` and installs a new snapshot built from it.
    ///
    /// On error nothing is replaced and the current snapshot keeps serving.
    pub fn rebuild_index(&self, source: &dyn CatalogSource) -> Result<IndexStats, CatalogError> {
        let mut generation = self.rebuild.lock();
        let items = match source.load() {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!(source = %source.describe(), error = %err, "catalog load failed, keeping current snapshot");
                return Err(err);
            }
        };
        let next = Snapshot::build(items, self.analyzer, *generation + 1);
        let stats = next.stats.clone();
        *self.current.write() = Arc::new(next);
        *generation += 1;
        tracing::info!(
            source = %source.describe(),
            num_docs = stats.num_docs,
            num_terms = stats.num_terms,
            generation = stats.generation,
            "index rebuilt"
        );
        Ok(stats)
    }

    pub fn stats(&self) -> IndexStats {
        self.snapshot().stats.clone()
    }

    /// First row whose name equals `name` exactly.
    pub fn find_by_name(&self, name: &str) -> Option<CatalogItem> {
        self.snapshot().items.iter().find(|item| item.name == name).cloned()
    }
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new(Analyzer::default())
    }
}
