//! Retrieval adapter: indexing and similarity lookup.
//!
//! [`Retriever`] ties an [`Embedder`] to a [`Store`]. Documents are always
//! embedded with [`INDEX_INPUT_TYPE`] and queries with [`QUERY_INPUT_TYPE`];
//! the mode travels with each call.
//!
//! When the query embedding fails, [`Retriever::retrieve`] falls back once
//! to a keyword-overlap search over the indexed texts and reports it through
//! [`Retrieval::fallback_used`]. Indexing failures are never masked.

use std::sync::Arc;

use rival_radar_core::embedding::{Embedder, InputType};
use rival_radar_core::models::{CompetitorRecord, IndexedDocument, ScoredRecord};
use rival_radar_core::store::Store;

/// Mode used when embedding competitor documents.
pub const INDEX_INPUT_TYPE: InputType = InputType::SearchDocument;
/// Mode used when embedding user queries.
pub const QUERY_INPUT_TYPE: InputType = InputType::SearchQuery;

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("no competitor records are indexed")]
    Empty,

    #[error("embedding failed: {0}")]
    Embedding(#[source] anyhow::Error),

    #[error("embedding provider returned {actual} vectors for {expected} texts")]
    CountMismatch { expected: usize, actual: usize },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("vector store error: {0}")]
    Store(#[source] anyhow::Error),
}

/// Result of a retrieval with provenance.
#[derive(Debug, Clone)]
pub struct Retrieval {
    /// Best matches first.
    pub hits: Vec<ScoredRecord>,
    /// True when the keyword fallback answered instead of vector search.
    pub fallback_used: bool,
}

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn Store>,
    batch_size: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn Store>, batch_size: usize) -> Self {
        Self {
            embedder,
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Number of indexed documents.
    pub async fn len(&self) -> usize {
        self.store.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Embed every record and replace the store contents with them.
    ///
    /// Returns the number of documents indexed.
    pub async fn index(&self, records: &[CompetitorRecord]) -> Result<usize, RetrievalError> {
        if records.is_empty() {
            return Err(RetrievalError::Empty);
        }

        let texts: Vec<String> = records.iter().map(CompetitorRecord::render).collect();
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let embedded = self
                .embedder
                .embed(batch, INDEX_INPUT_TYPE)
                .await
                .map_err(RetrievalError::Embedding)?;
            if embedded.len() != batch.len() {
                return Err(RetrievalError::CountMismatch {
                    expected: batch.len(),
                    actual: embedded.len(),
                });
            }
            vectors.extend(embedded);
        }

        let dims = vectors.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            return Err(RetrievalError::DimensionMismatch {
                expected: dims,
                actual: bad.len(),
            });
        }

        let docs: Vec<IndexedDocument> = records
            .iter()
            .cloned()
            .zip(vectors)
            .map(|(record, vector)| IndexedDocument::new(record, vector))
            .collect();
        let count = docs.len();
        self.store
            .replace_all(docs)
            .await
            .map_err(RetrievalError::Store)?;

        tracing::info!(
            documents = count,
            dims,
            model = self.embedder.model_name(),
            "built vector index"
        );
        Ok(count)
    }

    /// Embed `text` as a query and return the `k` nearest records.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredRecord>, RetrievalError> {
        if self.is_empty().await {
            return Err(RetrievalError::Empty);
        }
        let query_vec = self.embed_query(text).await?;
        self.store
            .vector_search(&query_vec, k)
            .await
            .map_err(RetrievalError::Store)
    }

    /// Retrieve `k` records for `text`, making sure every name in `pinned`
    /// that exists in the index is part of the result.
    ///
    /// Pinned records displace the lowest-scoring unpinned hits.
    pub async fn retrieve(
        &self,
        text: &str,
        k: usize,
        pinned: &[String],
    ) -> Result<Retrieval, RetrievalError> {
        if self.is_empty().await {
            return Err(RetrievalError::Empty);
        }

        match self.embed_query(text).await {
            Ok(query_vec) => {
                let mut hits = self
                    .store
                    .vector_search(&query_vec, k)
                    .await
                    .map_err(RetrievalError::Store)?;
                for name in pinned {
                    if contains(&hits, name) {
                        continue;
                    }
                    if let Some(hit) = self.store.score_record(name, &query_vec).await {
                        pin(&mut hits, hit, k, pinned);
                    }
                }
                sort_hits(&mut hits);
                Ok(Retrieval {
                    hits,
                    fallback_used: false,
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "query embedding failed, using keyword search");
                let mut hits = self
                    .store
                    .keyword_search(text, k)
                    .await
                    .map_err(RetrievalError::Store)?;
                let missing: Vec<&String> =
                    pinned.iter().filter(|n| !contains(&hits, n)).collect();
                if !missing.is_empty() {
                    let records = self.store.records().await;
                    for name in missing {
                        if let Some(record) =
                            records.iter().find(|r| r.name.eq_ignore_ascii_case(name))
                        {
                            let hit = ScoredRecord {
                                record: record.clone(),
                                score: 0.0,
                            };
                            pin(&mut hits, hit, k, pinned);
                        }
                    }
                }
                sort_hits(&mut hits);
                Ok(Retrieval {
                    hits,
                    fallback_used: true,
                })
            }
        }
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let mut vectors = self
            .embedder
            .embed(&[text.to_string()], QUERY_INPUT_TYPE)
            .await
            .map_err(RetrievalError::Embedding)?;
        match vectors.len() {
            1 => Ok(vectors.remove(0)),
            actual => Err(RetrievalError::CountMismatch {
                expected: 1,
                actual,
            }),
        }
    }
}

fn contains(hits: &[ScoredRecord], name: &str) -> bool {
    hits.iter().any(|h| h.record.name.eq_ignore_ascii_case(name))
}

fn is_pinned(name: &str, pinned: &[String]) -> bool {
    pinned.iter().any(|p| p.eq_ignore_ascii_case(name))
}

/// Add `hit`, evicting the lowest-scoring unpinned entry when already at `k`.
fn pin(hits: &mut Vec<ScoredRecord>, hit: ScoredRecord, k: usize, pinned: &[String]) {
    if hits.len() < k {
        hits.push(hit);
        return;
    }
    let victim = hits
        .iter()
        .enumerate()
        .filter(|(_, h)| !is_pinned(&h.record.name, pinned))
        .min_by(|(_, a), (_, b)| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i);
    match victim {
        Some(i) => hits[i] = hit,
        None => hits.push(hit),
    }
}

fn sort_hits(hits: &mut [ScoredRecord]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.record.name.cmp(&b.record.name))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use rival_radar_core::store::memory::InMemoryStore;
    use std::sync::Mutex;

    const DIMS: usize = 256;

    /// Bag-of-words embedder that records the mode of every call.
    #[derive(Default)]
    struct RecordingEmbedder {
        calls: Mutex<Vec<(InputType, usize)>>,
        fail_queries: bool,
    }

    impl RecordingEmbedder {
        fn modes(&self) -> Vec<InputType> {
            self.calls.lock().unwrap().iter().map(|(m, _)| *m).collect()
        }
    }

    fn bag_of_words(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIMS];
        for term in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() >= 3)
        {
            let slot = term.bytes().fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
            v[slot % DIMS] += 1.0;
        }
        v
    }

    #[async_trait]
    impl Embedder for RecordingEmbedder {
        fn model_name(&self) -> &str {
            "recording"
        }

        async fn embed(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>> {
            self.calls.lock().unwrap().push((input_type, texts.len()));
            if self.fail_queries && input_type == InputType::SearchQuery {
                bail!("provider unavailable");
            }
            Ok(texts.iter().map(|t| bag_of_words(t)).collect())
        }
    }

    fn records() -> Vec<CompetitorRecord> {
        vec![
            CompetitorRecord::new("Acme", "rocket skates", "cartoon ads", "Revenue $1M"),
            CompetitorRecord::new("Globex", "nuclear reactors", "trade shows", "Revenue $9M"),
            CompetitorRecord::new("Initech", "printer software", "cold calls", "Revenue $2M"),
            CompetitorRecord::new("Hooli", "search engine", "keynotes", "Revenue $50M"),
        ]
    }

    fn retriever(embedder: Arc<RecordingEmbedder>, batch: usize) -> Retriever {
        Retriever::new(embedder, Arc::new(InMemoryStore::new()), batch)
    }

    #[test]
    fn index_and_query_modes_differ() {
        assert_ne!(INDEX_INPUT_TYPE, QUERY_INPUT_TYPE);
        assert_eq!(INDEX_INPUT_TYPE.as_str(), "search_document");
        assert_eq!(QUERY_INPUT_TYPE.as_str(), "search_query");
    }

    #[tokio::test]
    async fn index_batches_with_document_mode() {
        let embedder = Arc::new(RecordingEmbedder::default());
        let r = retriever(embedder.clone(), 3);
        assert_eq!(r.index(&records()).await.unwrap(), 4);

        let calls = embedder.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![(InputType::SearchDocument, 3), (InputType::SearchDocument, 1)]
        );
    }

    #[tokio::test]
    async fn query_uses_query_mode() {
        let embedder = Arc::new(RecordingEmbedder::default());
        let r = retriever(embedder.clone(), 10);
        r.index(&records()).await.unwrap();
        let hits = r.query("nuclear reactors", 2).await.unwrap();
        assert_eq!(hits[0].record.name, "Globex");
        assert_eq!(
            embedder.modes(),
            vec![InputType::SearchDocument, InputType::SearchQuery]
        );
    }

    #[tokio::test]
    async fn reindexing_is_idempotent() {
        let r = retriever(Arc::new(RecordingEmbedder::default()), 10);
        r.index(&records()).await.unwrap();
        let first = r.query("search engine keynotes", 3).await.unwrap();
        r.index(&records()).await.unwrap();
        let second = r.query("search engine keynotes", 3).await.unwrap();
        assert_eq!(r.len().await, 4);
        let names = |h: &[ScoredRecord]| -> Vec<(String, f64)> {
            h.iter().map(|s| (s.record.name.clone(), s.score)).collect()
        };
        assert_eq!(names(&first), names(&second));
    }

    #[tokio::test]
    async fn empty_inputs_are_errors() {
        let r = retriever(Arc::new(RecordingEmbedder::default()), 10);
        assert!(matches!(r.index(&[]).await, Err(RetrievalError::Empty)));
        assert!(matches!(
            r.retrieve("anything", 3, &[]).await,
            Err(RetrievalError::Empty)
        ));
    }

    #[tokio::test]
    async fn pinned_names_displace_lowest_hits() {
        let r = retriever(Arc::new(RecordingEmbedder::default()), 10);
        r.index(&records()).await.unwrap();
        let result = r
            .retrieve("nuclear reactors", 1, &["Initech".to_string()])
            .await
            .unwrap();
        let names: Vec<&str> = result.hits.iter().map(|h| h.record.name.as_str()).collect();
        assert_eq!(names, vec!["Initech"]);

        let result = r
            .retrieve(
                "nuclear reactors",
                2,
                &["Initech".to_string(), "Hooli".to_string()],
            )
            .await
            .unwrap();
        let mut names: Vec<&str> = result.hits.iter().map(|h| h.record.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["Hooli", "Initech"]);
        assert!(!result.fallback_used);
    }

    #[tokio::test]
    async fn failed_query_embedding_falls_back_to_keywords() {
        let embedder = Arc::new(RecordingEmbedder {
            fail_queries: true,
            ..Default::default()
        });
        let r = retriever(embedder, 10);
        r.index(&records()).await.unwrap();

        let result = r
            .retrieve("who sells printer software", 2, &["Acme".to_string()])
            .await
            .unwrap();
        assert!(result.fallback_used);
        let names: Vec<&str> = result.hits.iter().map(|h| h.record.name.as_str()).collect();
        assert_eq!(names, vec!["Initech", "Acme"]);

        assert!(matches!(
            r.query("printer", 2).await,
            Err(RetrievalError::Embedding(_))
        ));
    }
}
