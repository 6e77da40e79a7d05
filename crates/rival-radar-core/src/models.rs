//! Core data models used throughout Rival Radar.
//!
//! These types represent the competitor records loaded from CSV, the
//! documents the vector store indexes, and the retrieval results that flow
//! into prompt construction.

use serde::Serialize;

/// CSV column holding the competitor's name.
pub const COL_NAME: &str = "Competitor Name";
/// CSV column holding the product description.
pub const COL_PRODUCT: &str = "Product Description";
/// CSV column holding the marketing strategy.
pub const COL_MARKETING: &str = "Marketing Strategy";
/// CSV column holding the financial summary.
pub const COL_FINANCIAL: &str = "Financial Summary";

/// All columns a competitor CSV must carry, in canonical order.
pub const REQUIRED_COLUMNS: [&str; 4] = [COL_NAME, COL_PRODUCT, COL_MARKETING, COL_FINANCIAL];

/// One competitor, sourced one-to-one from a CSV row.
///
/// Records are immutable once loaded; identity is the `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompetitorRecord {
    pub name: String,
    pub product_description: String,
    pub marketing_strategy: String,
    pub financial_summary: String,
}

impl CompetitorRecord {
    pub fn new(
        name: impl Into<String>,
        product_description: impl Into<String>,
        marketing_strategy: impl Into<String>,
        financial_summary: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            product_description: product_description.into(),
            marketing_strategy: marketing_strategy.into(),
            financial_summary: financial_summary.into(),
        }
    }

    /// Render the record as the text blob that gets embedded and shown to
    /// the model as context.
    pub fn render(&self) -> String {
        format!(
            "Competitor: {}\n\nProduct Description: {}\n\nMarketing Strategy: {}\n\nFinancial Summary: {}",
            self.name, self.product_description, self.marketing_strategy, self.financial_summary
        )
    }
}

/// A record rendered to text together with its embedding vector.
///
/// Owned by a [`Store`](crate::store::Store). There is exactly one indexed
/// document per competitor record.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub record: CompetitorRecord,
    pub text: String,
    pub vector: Vec<f32>,
}

impl IndexedDocument {
    pub fn new(record: CompetitorRecord, vector: Vec<f32>) -> Self {
        let text = record.render();
        Self {
            record,
            text,
            vector,
        }
    }

    /// Document identity, shared with the record.
    pub fn id(&self) -> &str {
        &self.record.name
    }
}

/// A record returned from a store search, with its relevance score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredRecord {
    pub record: CompetitorRecord,
    /// Cosine similarity for vector search, term overlap ratio for keyword search.
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_every_field() {
        let r = CompetitorRecord::new("Acme", "Widgets", "Billboards", "Revenue $1M");
        let text = r.render();
        assert!(text.starts_with("Competitor: Acme"));
        assert!(text.contains("Product Description: Widgets"));
        assert!(text.contains("Marketing Strategy: Billboards"));
        assert!(text.contains("Financial Summary: Revenue $1M"));
    }

    #[test]
    fn indexed_document_id_is_record_name() {
        let doc = IndexedDocument::new(CompetitorRecord::new("Acme", "a", "b", "c"), vec![1.0]);
        assert_eq!(doc.id(), "Acme");
        assert_eq!(doc.text, doc.record.render());
    }
}
