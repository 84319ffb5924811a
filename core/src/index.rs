use std::collections::HashMap;

/// Position of a document in the catalog. Also its identity.
pub type DocId = usize;

/// BM25 statistics for a static corpus.
///
/// Only token counts and lengths survive construction; the token sequences
/// themselves are dropped. There is no way to add or remove a document,
/// a changed corpus means a new index.
#[derive(Debug, Clone, Default)]
pub struct Bm25Index {
    /// Per-document token counts, in corpus order.
    term_freqs: Vec<HashMap<String, u32>>,
    /// Per-document token length, in corpus order.
    doc_lengths: Vec<u32>,
    /// Number of documents containing each term at least once.
    doc_freqs: HashMap<String, u32>,
    avg_doc_len: f64,
}

impl Bm25Index {
    pub fn build<D: AsRef<[String]>>(docs: &[D]) -> Self {
        let mut term_freqs = Vec::with_capacity(docs.len());
        let mut doc_lengths = Vec::with_capacity(docs.len());
        let mut doc_freqs: HashMap<String, u32> = HashMap::new();
        let mut total_len: u64 = 0;

        for doc in docs {
            let tokens = doc.as_ref();
            let mut counts: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *counts.entry(token.clone()).or_insert(0) += 1;
            }
            for term in counts.keys() {
                *doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }
            doc_lengths.push(tokens.len() as u32);
            total_len += tokens.len() as u64;
            term_freqs.push(counts);
        }

        let avg_doc_len = if docs.is_empty() { 0.0 } else { total_len as f64 / docs.len() as f64 };
        Self { term_freqs, doc_lengths, doc_freqs, avg_doc_len }
    }

    pub fn num_docs(&self) -> usize { self.doc_lengths.len() }

    pub fn is_empty(&self) -> bool { self.doc_lengths.is_empty() }

    /// Number of distinct terms across the corpus.
    pub fn num_terms(&self) -> usize { self.doc_freqs.len() }

    pub fn avg_doc_len(&self) -> f64 { self.avg_doc_len }

    pub fn doc_len(&self, doc: DocId) -> u32 {
        self.doc_lengths.get(doc).copied().unwrap_or(0)
    }

    pub fn doc_freq(&self, term: &str) -> u32 {
        self.doc_freqs.get(term).copied().unwrap_or(0)
    }

    pub fn term_freq(&self, doc: DocId, term: &str) -> u32 {
        self.term_freqs
            .get(doc)
            .and_then(|counts| counts.get(term))
            .copied()
            .unwrap_or(0)
    }
}
