//! Disk-backed inverted keyword index with BM25 scoring
//!
//! Postings carry per-term document frequencies and per-document lengths,
//! which is everything BM25 (k1=1.5, b=0.75) needs. The index is an
//! in-memory structure snapshotted to JSON; the embedded backend persists
//! it after every committed upsert.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use ab_domain::constants::search::{BM25_B, BM25_K1, BM25_TOKEN_MIN_LENGTH, STOPWORDS};

/// Per-document postings entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DocEntry {
    /// Total token count (document length for normalization)
    len: u32,
    /// Term → in-document frequency
    term_freqs: HashMap<String, u32>,
}

/// Inverted index over chunk texts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeywordIndex {
    /// chunk_id → postings entry (BTreeMap for deterministic iteration)
    docs: BTreeMap<String, DocEntry>,
    /// term → number of documents containing it
    doc_freqs: HashMap<String, u32>,
    /// Sum of all document lengths
    total_len: u64,
}

impl KeywordIndex {
    /// Lowercased alphanumeric tokens, identifiers split on `_`, stopwords
    /// and sub-minimum tokens removed.
    #[must_use]
    pub fn tokenize(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric() && c != '_')
            .flat_map(|word| word.split('_'))
            .map(str::to_lowercase)
            .filter(|t| t.len() >= BM25_TOKEN_MIN_LENGTH && !STOPWORDS.contains(&t.as_str()))
            .collect()
    }

    /// Index or re-index one document's text
    pub fn add(&mut self, chunk_id: &str, text: &str) {
        self.remove(chunk_id);

        let tokens = Self::tokenize(text);
        let mut entry = DocEntry {
            len: tokens.len() as u32,
            term_freqs: HashMap::new(),
        };
        for token in tokens {
            *entry.term_freqs.entry(token).or_insert(0) += 1;
        }
        for term in entry.term_freqs.keys() {
            *self.doc_freqs.entry(term.clone()).or_insert(0) += 1;
        }
        self.total_len += u64::from(entry.len);
        self.docs.insert(chunk_id.to_owned(), entry);
    }

    /// Drop a document from the index; unknown ids are a no-op
    pub fn remove(&mut self, chunk_id: &str) {
        if let Some(entry) = self.docs.remove(chunk_id) {
            self.total_len -= u64::from(entry.len);
            for term in entry.term_freqs.keys() {
                if let Some(df) = self.doc_freqs.get_mut(term) {
                    *df -= 1;
                    if *df == 0 {
                        self.doc_freqs.remove(term);
                    }
                }
            }
        }
    }

    /// Clear the index entirely
    pub fn clear(&mut self) {
        self.docs.clear();
        self.doc_freqs.clear();
        self.total_len = 0;
    }

    /// Number of indexed documents
    #[must_use]
    pub fn total_docs(&self) -> usize {
        self.docs.len()
    }

    /// Number of distinct terms
    #[must_use]
    pub fn unique_terms(&self) -> usize {
        self.doc_freqs.len()
    }

    /// Mean document length
    #[must_use]
    pub fn avg_doc_len(&self) -> f32 {
        if self.docs.is_empty() {
            return 0.0;
        }
        self.total_len as f32 / self.docs.len() as f32
    }

    /// Rank all matching documents for `query`, best first, ties broken by
    /// ascending chunk id. A query of only stopwords yields an empty list.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<(String, f32)> {
        let query_terms = Self::tokenize(query);
        if query_terms.is_empty() || self.docs.is_empty() {
            return Vec::new();
        }

        let n = self.docs.len() as f32;
        let avg_len = self.avg_doc_len();

        let mut scored: Vec<(String, f32)> = self
            .docs
            .iter()
            .filter_map(|(chunk_id, entry)| {
                let score: f32 = query_terms
                    .iter()
                    .filter_map(|term| {
                        let tf = *entry.term_freqs.get(term)? as f32;
                        let df = *self.doc_freqs.get(term)? as f32;
                        let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
                        let denom = tf
                            + BM25_K1 * (1.0 - BM25_B + BM25_B * entry.len as f32 / avg_len.max(1.0));
                        Some(idf * tf * (BM25_K1 + 1.0) / denom)
                    })
                    .sum();
                (score > 0.0).then(|| (chunk_id.clone(), score))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> KeywordIndex {
        let mut index = KeywordIndex::default();
        index.add(
            "auth",
            "authenticate the user and validate their credentials with proper authentication",
        );
        index.add(
            "password",
            "validate the password using hash function for security",
        );
        index.add(
            "storage",
            "process the data and compress it for storage optimization",
        );
        index
    }

    #[test]
    fn tokenize_splits_identifiers_and_drops_stopwords() {
        let tokens = KeywordIndex::tokenize("fn hello_world() { the_value }");
        assert!(tokens.contains(&"hello".to_owned()));
        assert!(tokens.contains(&"world".to_owned()));
        assert!(tokens.contains(&"value".to_owned()));
        assert!(!tokens.contains(&"the".to_owned()));
    }

    #[test]
    fn relevant_document_ranks_first() {
        let index = seeded();
        let results = index.search("authenticate user validate");
        assert_eq!(results[0].0, "auth");
        assert!(results[0].1 > 0.0);
    }

    #[test]
    fn stopword_only_query_is_empty_not_error() {
        let index = seeded();
        assert!(index.search("the and of").is_empty());
    }

    #[test]
    fn remove_keeps_statistics_consistent() {
        let mut index = seeded();
        assert_eq!(index.total_docs(), 3);
        index.remove("auth");
        assert_eq!(index.total_docs(), 2);
        assert!(index.search("authentication").is_empty());

        // Re-adding the same id replaces rather than duplicates.
        index.add("password", "password password password");
        assert_eq!(index.total_docs(), 2);
    }

    #[test]
    fn ties_break_by_ascending_chunk_id() {
        let mut index = KeywordIndex::default();
        index.add("bbb", "identical content here");
        index.add("aaa", "identical content here");
        let results = index.search("identical content");
        assert_eq!(results[0].0, "aaa");
        assert_eq!(results[1].0, "bbb");
        assert!((results[0].1 - results[1].1).abs() < 1e-6);
    }

    #[test]
    fn snapshot_round_trip() {
        let index = seeded();
        let json = serde_json::to_string(&index).expect("serialize");
        let restored: KeywordIndex = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored.total_docs(), 3);
        assert_eq!(
            restored.search("authenticate")[0].0,
            index.search("authenticate")[0].0
        );
    }
}
