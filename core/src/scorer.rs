//! BM25 scoring, top-k ranking and the catalog join.

use crate::catalog::CatalogItem;
use crate::index::{Bm25Index, DocId};
use serde::Serialize;

/// Number of results returned when the caller does not ask for a specific count.
pub const DEFAULT_K: usize = 10;

/// BM25 free parameters.
///
/// The defaults are the classic Okapi values and are what the engine uses;
/// they are kept fixed so scores stay comparable across builds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// A ranked hit joined with its catalog row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    /// 1-based output position.
    pub rank: usize,
    pub text: String,
    pub price: Option<f64>,
    pub store: Option<String>,
    pub score: f64,
}

/// `ln((N - n + 0.5) / (n + 0.5) + 1)`. Never negative, even for terms in every document.
pub fn idf(num_docs: usize, doc_freq: u32) -> f64 {
    let n = num_docs as f64;
    let df = doc_freq as f64;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// Scores every document against the query tokens, in corpus order.
///
/// Each query token is counted once per occurrence. A token missing from a
/// document adds nothing to that document's score.
pub fn score(query_tokens: &[String], index: &Bm25Index) -> Vec<f64> {
    score_with(query_tokens, index, Bm25Params::default())
}

pub fn score_with(query_tokens: &[String], index: &Bm25Index, params: Bm25Params) -> Vec<f64> {
    let n = index.num_docs();
    let mut scores = vec![0.0; n];
    if n == 0 || query_tokens.is_empty() {
        return scores;
    }

    let avgdl = index.avg_doc_len();
    let Bm25Params { k1, b } = params;
    for term in query_tokens {
        let df = index.doc_freq(term);
        if df == 0 {
            continue;
        }
        let term_idf = idf(n, df);
        for (doc, slot) in scores.iter_mut().enumerate() {
            let tf = index.term_freq(doc, term);
            if tf == 0 {
                continue;
            }
            // tf > 0 implies a non-empty document, so avgdl > 0 here.
            let tf = tf as f64;
            let dl = index.doc_len(doc) as f64;
            *slot += term_idf * (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * dl / avgdl));
        }
    }
    scores
}

/// Top `k` documents by descending score. Equal scores keep corpus order.
pub fn rank(scores: &[f64], k: usize) -> Vec<(DocId, f64)> {
    if k == 0 || scores.is_empty() {
        return Vec::new();
    }
    let mut order: Vec<DocId> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then_with(|| a.cmp(&b)));
    order.truncate(k);
    order.into_iter().map(|doc| (doc, scores[doc])).collect()
}

/// Joins ranked documents with their catalog rows by position.
///
/// A ranked id outside the catalog is skipped; ranks are assigned after
/// skipping so they stay contiguous.
pub fn enrich(ranked: &[(DocId, f64)], items: &[CatalogItem]) -> Vec<RankedResult> {
    ranked
        .iter()
        .filter_map(|&(doc, score)| items.get(doc).map(|item| (item, score)))
        .enumerate()
        .map(|(pos, (item, score))| RankedResult {
            rank: pos + 1,
            text: item.name.clone(),
            price: item.price,
            store: item.store.clone(),
            score,
        })
        .collect()
}
