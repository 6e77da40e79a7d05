//! In-memory [`Store`] implementation.
//!
//! Keeps documents in a `Vec` behind `std::sync::RwLock`. Vector search is
//! brute-force cosine similarity over all stored vectors, which is plenty
//! for a competitor list measured in dozens of rows. Keyword search counts
//! query-term hits in each document's rendered text.

use std::cmp::Ordering;
use std::sync::{RwLock, RwLockReadGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{CompetitorRecord, IndexedDocument, ScoredRecord};

use super::Store;

/// In-memory vector store.
pub struct InMemoryStore {
    docs: RwLock<Vec<IndexedDocument>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<IndexedDocument>> {
        // A panic while holding the lock cannot leave the Vec half-written:
        // writers only ever swap the whole Vec.
        self.docs.read().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercased alphanumeric terms of at least three characters.
fn terms(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 3)
        .map(str::to_string)
        .collect()
}

fn rank(mut hits: Vec<ScoredRecord>, limit: usize) -> Vec<ScoredRecord> {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.record.name.cmp(&b.record.name))
    });
    hits.truncate(limit);
    hits
}

#[async_trait]
impl Store for InMemoryStore {
    async fn replace_all(&self, docs: Vec<IndexedDocument>) -> Result<()> {
        let mut guard = self
            .docs
            .write()
            .map_err(|_| anyhow!("vector store lock poisoned"))?;
        *guard = docs;
        Ok(())
    }

    async fn len(&self) -> usize {
        self.read().len()
    }

    async fn records(&self) -> Vec<CompetitorRecord> {
        self.read().iter().map(|d| d.record.clone()).collect()
    }

    async fn vector_search(&self, query_vec: &[f32], limit: usize) -> Result<Vec<ScoredRecord>> {
        let docs = self.read();
        if let Some(first) = docs.first() {
            if first.vector.len() != query_vec.len() {
                return Err(anyhow!(
                    "query vector has {} dims, index has {}",
                    query_vec.len(),
                    first.vector.len()
                ));
            }
        }
        let hits = docs
            .iter()
            .map(|d| ScoredRecord {
                record: d.record.clone(),
                score: cosine_similarity(query_vec, &d.vector) as f64,
            })
            .collect();
        Ok(rank(hits, limit))
    }

    async fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<ScoredRecord>> {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }
        let docs = self.read();
        let hits = docs
            .iter()
            .filter_map(|d| {
                let text_lower = d.text.to_lowercase();
                let matches = query_terms
                    .iter()
                    .filter(|t| text_lower.contains(t.as_str()))
                    .count();
                (matches > 0).then(|| ScoredRecord {
                    record: d.record.clone(),
                    score: matches as f64 / query_terms.len() as f64,
                })
            })
            .collect();
        Ok(rank(hits, limit))
    }

    async fn score_record(&self, name: &str, query_vec: &[f32]) -> Option<ScoredRecord> {
        self.read()
            .iter()
            .find(|d| d.record.name.eq_ignore_ascii_case(name))
            .map(|d| ScoredRecord {
                record: d.record.clone(),
                score: cosine_similarity(query_vec, &d.vector) as f64,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str, product: &str, vector: Vec<f32>) -> IndexedDocument {
        IndexedDocument::new(
            CompetitorRecord::new(name, product, "direct sales", "Revenue $10M"),
            vector,
        )
    }

    async fn sample_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .replace_all(vec![
                doc("Alpha", "cloud analytics platform", vec![1.0, 0.0, 0.0]),
                doc("Beta", "security scanner", vec![0.0, 1.0, 0.0]),
                doc("Gamma", "cloud security suite", vec![0.7, 0.7, 0.0]),
            ])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn vector_search_orders_by_similarity() {
        let store = sample_store().await;
        let hits = store.vector_search(&[1.0, 0.1, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.name, "Alpha");
        assert_eq!(hits[1].record.name, "Gamma");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn vector_search_rejects_dimension_mismatch() {
        let store = sample_store().await;
        assert!(store.vector_search(&[1.0, 0.0], 3).await.is_err());
    }

    #[tokio::test]
    async fn keyword_search_counts_term_overlap() {
        let store = sample_store().await;
        let hits = store.keyword_search("cloud security", 10).await.unwrap();
        assert_eq!(hits[0].record.name, "Gamma");
        assert!((hits[0].score - 1.0).abs() < 1e-9);
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn keyword_search_ignores_short_terms() {
        let store = sample_store().await;
        assert!(store.keyword_search("a b", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replace_all_swaps_documents() {
        let store = sample_store().await;
        assert_eq!(store.len().await, 3);
        store
            .replace_all(vec![doc("Delta", "crm", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();
        let names: Vec<String> = store.records().await.into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Delta"]);
    }

    #[tokio::test]
    async fn score_record_is_case_insensitive() {
        let store = sample_store().await;
        let hit = store.score_record("beta", &[0.0, 1.0, 0.0]).await.unwrap();
        assert_eq!(hit.record.name, "Beta");
        assert!((hit.score - 1.0).abs() < 1e-6);
        assert!(store.score_record("Omega", &[0.0, 1.0, 0.0]).await.is_none());
    }
}
