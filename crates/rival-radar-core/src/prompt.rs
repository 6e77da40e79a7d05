//! Prompt templates and the generation trait.
//!
//! Every generation call carries the fixed [`SYSTEM_PROMPT`] as its
//! preamble plus a per-query message rendered from the template selected by
//! the query's [`Intent`]. Templates interpolate `{query}` and `{context}`.

use anyhow::Result;
use async_trait::async_trait;

use crate::intent::Intent;
use crate::models::ScoredRecord;

/// Preamble sent with every generation request.
pub const SYSTEM_PROMPT: &str = "You are a competitive analysis expert. Provide clear, factual \
responses about competitors based on the provided data. Be direct and concise.";

const GENERAL_TEMPLATE: &str = "Based on the competitor data provided, answer this query directly and concisely:

Query: {query}

Context:
{context}

Instructions:
- Be factual and specific
- Use data from the context
- Keep responses focused
- Avoid unnecessary elaboration

Answer:";

const COMPARISON_TEMPLATE: &str = "Compare the competitors in the data below to answer this query:

Query: {query}

Context:
{context}

Instructions:
- Address every competitor the query names, side by side
- Contrast them on the dimension the query asks about
- Point out where one clearly leads and why, citing the context
- Use only data from the context

Answer:";

const FINANCIAL_TEMPLATE: &str = "Answer this financial question using the competitor data below:

Query: {query}

Context:
{context}

Instructions:
- Quote revenue, growth and funding figures exactly as given
- Rank or order competitors when the query asks for highest or lowest
- Do not estimate figures that are not in the context

Answer:";

const PRODUCT_TEMPLATE: &str = "Answer this product question using the competitor data below:

Query: {query}

Context:
{context}

Instructions:
- Describe the relevant products and their capabilities
- Group competitors that offer similar solutions
- Use only data from the context

Answer:";

const MARKET_TEMPLATE: &str = "Answer this go-to-market question using the competitor data below:

Query: {query}

Context:
{context}

Instructions:
- Summarize each relevant marketing strategy in one or two sentences
- Note target segments and channels where the context gives them
- Use only data from the context

Answer:";

/// Template text for an intent.
pub fn template_for(intent: Intent) -> &'static str {
    match intent {
        Intent::General => GENERAL_TEMPLATE,
        Intent::Comparison => COMPARISON_TEMPLATE,
        Intent::Financial => FINANCIAL_TEMPLATE,
        Intent::Product => PRODUCT_TEMPLATE,
        Intent::Market => MARKET_TEMPLATE,
    }
}

/// Render retrieved records as numbered context blocks.
pub fn render_context(records: &[ScoredRecord]) -> String {
    if records.is_empty() {
        return "(no competitor data matched this query)".to_string();
    }
    records
        .iter()
        .enumerate()
        .map(|(i, hit)| format!("[{}] {}", i + 1, hit.record.render()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render the per-query message for `intent`.
pub fn render_prompt(intent: Intent, query: &str, records: &[ScoredRecord]) -> String {
    // Context first: cleaned CSV text never contains braces, user text might.
    template_for(intent)
        .replace("{context}", &render_context(records))
        .replace("{query}", query)
}

/// Sampling parameters sent with every generation request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Nucleus-sampling cutoff.
    pub p: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 512,
            p: 0.75,
        }
    }
}

/// A single generation call: system preamble plus rendered message.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub preamble: String,
    pub message: String,
    pub params: SamplingParams,
}

/// Trait for text-generation backends.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier (e.g. `"command-r-plus-08-2024"`).
    fn model_name(&self) -> &str;

    /// Generate a completion for `request`.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CompetitorRecord;

    fn hit(name: &str) -> ScoredRecord {
        ScoredRecord {
            record: CompetitorRecord::new(name, "p", "m", "f"),
            score: 0.5,
        }
    }

    #[test]
    fn every_template_has_both_placeholders() {
        for intent in Intent::PRECEDENCE {
            let t = template_for(intent);
            assert!(t.contains("{query}"), "{intent} lacks {{query}}");
            assert!(t.contains("{context}"), "{intent} lacks {{context}}");
        }
    }

    #[test]
    fn render_prompt_interpolates_query_and_records() {
        let prompt = render_prompt(
            Intent::Comparison,
            "Compare A and B",
            &[hit("Alpha"), hit("Beta")],
        );
        assert!(prompt.contains("Query: Compare A and B"));
        assert!(prompt.contains("[1] Competitor: Alpha"));
        assert!(prompt.contains("[2] Competitor: Beta"));
        assert!(!prompt.contains("{context}"));
    }

    #[test]
    fn empty_context_is_explicit() {
        let prompt = render_prompt(Intent::General, "anything", &[]);
        assert!(prompt.contains("no competitor data matched"));
    }

    #[test]
    fn default_sampling_params() {
        let p = SamplingParams::default();
        assert_eq!(p.max_tokens, 512);
        assert!((p.temperature - 0.1).abs() < f32::EPSILON);
        assert!((p.p - 0.75).abs() < f32::EPSILON);
    }
}
