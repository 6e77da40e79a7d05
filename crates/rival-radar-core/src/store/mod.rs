//! Storage abstraction for indexed competitor documents.
//!
//! The [`Store`] trait defines the operations the retrieval adapter needs,
//! keeping the similarity search independent of where vectors live.
//! [`memory::InMemoryStore`] is the only backend today.
//!
//! Implementations must be `Send + Sync` so the web front end can share one
//! store across handlers.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{CompetitorRecord, IndexedDocument, ScoredRecord};

/// Abstract vector store over [`IndexedDocument`]s.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`replace_all`](Store::replace_all) | Swap the whole indexed set |
/// | [`len`](Store::len) | Number of indexed documents |
/// | [`records`](Store::records) | Indexed records in insertion order |
/// | [`vector_search`](Store::vector_search) | Cosine-similarity top-k |
/// | [`keyword_search`](Store::keyword_search) | Term-overlap top-k |
/// | [`score_record`](Store::score_record) | Similarity of one named record |
#[async_trait]
pub trait Store: Send + Sync {
    /// Replace every stored document with `docs`.
    async fn replace_all(&self, docs: Vec<IndexedDocument>) -> Result<()>;

    /// Number of stored documents.
    async fn len(&self) -> usize;

    /// Stored records, in the order they were indexed.
    async fn records(&self) -> Vec<CompetitorRecord>;

    /// Return up to `limit` documents ordered by cosine similarity to `query_vec`.
    async fn vector_search(&self, query_vec: &[f32], limit: usize) -> Result<Vec<ScoredRecord>>;

    /// Return up to `limit` documents containing query terms, best overlap first.
    async fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<ScoredRecord>>;

    /// Similarity between `query_vec` and the document for `name`, if indexed.
    async fn score_record(&self, name: &str, query_vec: &[f32]) -> Option<ScoredRecord>;
}
