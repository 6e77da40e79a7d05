//! Query orchestration.
//!
//! [`Agent`] owns everything a session needs: the retriever, the generation
//! backend, the loaded records and the [`HistoryStore`]. A query goes
//! through these steps:
//!
//! 1. Validate (empty, shorter than three characters or longer than
//!    [`MAX_QUERY_CHARS`] is rejected before any network call and is not
//!    recorded).
//! 2. Analyze: intent, mentioned competitors, aspects, complexity.
//! 3. Retrieve the top-k records, pinning every mentioned competitor.
//! 4. Render the intent's prompt template and generate an answer.
//! 5. Append the metadata footer and record the exchange in history.
//!
//! Provider and retrieval failures become a user-facing answer at step 4 and
//! are recorded like any other answer.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rival_radar_core::embedding::Embedder;
use rival_radar_core::history::{HistoryStore, QueryHistoryEntry};
use rival_radar_core::intent::{analyze, retrieval_depth, Intent, QueryAnalysis};
use rival_radar_core::models::CompetitorRecord;
use rival_radar_core::prompt::{
    render_prompt, GenerationRequest, Generator, SamplingParams, SYSTEM_PROMPT,
};
use rival_radar_core::store::memory::InMemoryStore;
use rival_radar_core::store::Store;

use crate::config::Config;
use crate::data::{file_fingerprint, load_competitors, LoadReport};
use crate::provider::{CohereClient, ProviderError};
use crate::retrieval::{RetrievalError, Retriever};

/// Shortest accepted query, in characters.
pub const MIN_QUERY_CHARS: usize = 3;

/// Longest accepted query, in characters.
pub const MAX_QUERY_CHARS: usize = 2000;

/// Why a query was refused before processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueryRejection {
    #[error("Please enter a question about your competitors.")]
    Empty,
    #[error("Please enter a more specific question (at least 3 characters).")]
    TooShort,
    #[error("Your question is too long. Please keep it under 2000 characters.")]
    TooLong,
}

/// Check a raw query and return it trimmed.
pub fn validate_query(query: &str) -> Result<&str, QueryRejection> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        Err(QueryRejection::Empty)
    } else if trimmed.chars().count() < MIN_QUERY_CHARS {
        Err(QueryRejection::TooShort)
    } else if trimmed.chars().count() > MAX_QUERY_CHARS {
        Err(QueryRejection::TooLong)
    } else {
        Ok(trimmed)
    }
}

/// A processed query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub answer: String,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub intent: Intent,
    /// Names of the records used as context.
    pub sources: Vec<String>,
    pub fallback_used: bool,
    /// False when the answer is an error message.
    pub succeeded: bool,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Snapshot of agent state for `status` displays.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatus {
    pub initialized: bool,
    pub competitors: usize,
    pub indexed_documents: usize,
    pub history_entries: usize,
    pub history_capacity: Option<usize>,
    pub csv_path: PathBuf,
    pub fingerprint: Option<String>,
    /// The CSV on disk no longer matches what was indexed.
    pub data_changed: bool,
    pub skipped_rows: usize,
    pub embed_model: String,
    pub chat_model: String,
    pub top_k: usize,
}

/// Settings an [`Agent`] needs from configuration.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub csv_path: PathBuf,
    pub top_k: usize,
    pub sampling: SamplingParams,
    pub export_dir: PathBuf,
}

impl AgentSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            csv_path: config.data.csv_path.clone(),
            top_k: config.retrieval.top_k,
            sampling: config.generation.sampling(),
            export_dir: config.history.export_dir.clone(),
        }
    }
}

pub struct Agent {
    retriever: Retriever,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    history: HistoryStore,
    settings: AgentSettings,
    records: Vec<CompetitorRecord>,
    fingerprint: Option<String>,
    skipped_rows: usize,
    initialized: bool,
}

/// Build the production agent from configuration. Fails early when the
/// API key is missing. The returned agent still needs [`Agent::initialize`].
pub fn build_agent(config: &Config) -> Result<Agent> {
    let api_key = config.require_api_key()?;
    let client = Arc::new(CohereClient::new(&config.provider, api_key)?);
    let history = match config.history.max_entries {
        Some(n) => HistoryStore::with_capacity(n),
        None => HistoryStore::new(),
    };
    Ok(Agent::new(
        client.clone(),
        client,
        Arc::new(InMemoryStore::new()),
        AgentSettings::from_config(config),
        history,
        config.provider.batch_size,
    ))
}

impl Agent {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        store: Arc<dyn Store>,
        settings: AgentSettings,
        history: HistoryStore,
        batch_size: usize,
    ) -> Self {
        Self {
            retriever: Retriever::new(embedder.clone(), store, batch_size),
            embedder,
            generator,
            history,
            settings,
            records: Vec::new(),
            fingerprint: None,
            skipped_rows: 0,
            initialized: false,
        }
    }

    /// Load the CSV and build the vector index.
    pub async fn initialize(&mut self) -> Result<LoadReport> {
        let path = self.settings.csv_path.clone();
        let report = load_competitors(&path)?;
        if report.records.is_empty() {
            bail!(
                "{} contains no valid competitor rows ({} skipped)",
                path.display(),
                report.skipped
            );
        }

        self.retriever
            .index(&report.records)
            .await
            .context("Failed to build the competitor index")?;

        self.records = report.records.clone();
        self.fingerprint = Some(report.fingerprint.clone());
        self.skipped_rows = report.skipped;
        self.initialized = true;
        tracing::info!(competitors = self.records.len(), "agent initialized");
        Ok(report)
    }

    /// Reload the CSV and rebuild the index. On failure the previous
    /// index stays in place.
    pub async fn reload(&mut self) -> Result<LoadReport> {
        tracing::info!(path = %self.settings.csv_path.display(), "reloading competitor data");
        self.initialize().await
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn records(&self) -> &[CompetitorRecord] {
        &self.records
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn recent_history(&self, n: usize) -> Vec<QueryHistoryEntry> {
        self.history.recent(n)
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Export history to `path`, or to a timestamped file in the configured
    /// export directory. Returns the path written.
    pub fn export_history(&self, path: Option<&Path>) -> Result<PathBuf> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => self.settings.export_dir.join(default_export_name()),
        };
        self.history.export(&path)?;
        tracing::info!(path = %path.display(), entries = self.history.len(), "exported history");
        Ok(path)
    }

    pub async fn status(&self) -> AgentStatus {
        let data_changed = match (&self.fingerprint, file_fingerprint(&self.settings.csv_path)) {
            (Some(indexed), Some(on_disk)) => *indexed != on_disk,
            _ => false,
        };
        AgentStatus {
            initialized: self.initialized,
            competitors: self.records.len(),
            indexed_documents: self.retriever.len().await,
            history_entries: self.history.len(),
            history_capacity: self.history.capacity(),
            csv_path: self.settings.csv_path.clone(),
            fingerprint: self.fingerprint.clone(),
            data_changed,
            skipped_rows: self.skipped_rows,
            embed_model: self.embedder.model_name().to_string(),
            chat_model: self.generator.model_name().to_string(),
            top_k: self.settings.top_k,
        }
    }

    /// Run one query through the pipeline and record it.
    pub async fn process_query(&mut self, query: &str) -> Result<QueryOutcome, QueryRejection> {
        let query = validate_query(query)?;
        let started = Instant::now();

        let names: Vec<&str> = self.records.iter().map(|r| r.name.as_str()).collect();
        let analysis = analyze(query, &names);
        tracing::debug!(
            intent = %analysis.intent,
            complexity = ?analysis.complexity,
            mentioned = ?analysis.competitors_mentioned,
            sub_goals = ?analysis.sub_goals,
            "analyzed query"
        );

        let (answer, sources, fallback_used, succeeded) =
            match self.answer(query, &analysis).await {
                Ok(answered) => (answered.text, answered.sources, answered.fallback_used, true),
                Err(err) => {
                    tracing::warn!(error = %format!("{err:#}"), "query failed");
                    (user_message(&err), Vec::new(), false, false)
                }
            };

        let elapsed = started.elapsed();
        self.history
            .record(query, answer.as_str(), elapsed, Some(analysis.intent));
        tracing::info!(
            intent = %analysis.intent,
            elapsed_ms = elapsed.as_millis() as u64,
            succeeded,
            "answered query"
        );

        Ok(QueryOutcome {
            answer,
            elapsed,
            intent: analysis.intent,
            sources,
            fallback_used,
            succeeded,
        })
    }

    async fn answer(&self, query: &str, analysis: &QueryAnalysis) -> Result<Answered> {
        if !self.initialized {
            return Err(RetrievalError::Empty.into());
        }

        let k = retrieval_depth(self.settings.top_k, analysis.complexity);
        let retrieval = self
            .retriever
            .retrieve(query, k, &analysis.competitors_mentioned)
            .await?;
        let sources: Vec<String> = retrieval
            .hits
            .iter()
            .map(|h| h.record.name.clone())
            .collect();

        let request = GenerationRequest {
            preamble: SYSTEM_PROMPT.to_string(),
            message: render_prompt(analysis.intent, query, &retrieval.hits),
            params: self.settings.sampling,
        };
        let generated = self.generator.generate(&request).await?;
        let generated = generated.trim();
        if generated.is_empty() {
            return Err(EmptyGeneration.into());
        }

        let text = format!("{}\n\n{}", generated, footer(analysis, &sources));
        Ok(Answered {
            text,
            sources,
            fallback_used: retrieval.fallback_used,
        })
    }
}

struct Answered {
    text: String,
    sources: Vec<String>,
    fallback_used: bool,
}

#[derive(Debug, thiserror::Error)]
#[error("the model returned an empty response")]
struct EmptyGeneration;

/// Metadata footer appended to every successful answer.
pub fn footer(analysis: &QueryAnalysis, sources: &[String]) -> String {
    let companies = if !analysis.competitors_mentioned.is_empty() {
        analysis.competitors_mentioned.join(", ")
    } else if !sources.is_empty() {
        sources.join(", ")
    } else {
        "none".to_string()
    };
    let focus = if analysis.aspects.is_empty() {
        "general".to_string()
    } else {
        analysis
            .aspects
            .iter()
            .map(|a| a.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "---\nCompanies: {} | Focus: {} | Intent: {}",
        companies, focus, analysis.intent
    )
}

/// `query_history_YYYYMMDD_HHMMSS.txt` for the current local time.
pub fn default_export_name() -> String {
    format!(
        "query_history_{}.txt",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    )
}

/// Turn a pipeline failure into text for the person asking.
pub fn user_message(err: &anyhow::Error) -> String {
    if let Some(provider) = err.chain().find_map(|e| e.downcast_ref::<ProviderError>()) {
        return match provider {
            ProviderError::RateLimited => {
                "Rate limit reached on the Cohere API. Please wait a moment and try again."
                    .to_string()
            }
            ProviderError::Timeout(_) => {
                "The request to the Cohere API timed out. Please try again.".to_string()
            }
            ProviderError::Network(_) => {
                "Could not reach the Cohere API. Please check your internet connection."
                    .to_string()
            }
            ProviderError::Auth { .. } => {
                "Authentication with the Cohere API failed. Please check COHERE_API_KEY."
                    .to_string()
            }
            ProviderError::Api { .. } | ProviderError::Parse(_) => {
                format!("The Cohere API returned an error: {provider}")
            }
        };
    }
    if let Some(RetrievalError::Empty) = err.downcast_ref::<RetrievalError>() {
        return "No competitor data is loaded. Fix the CSV and run `reload`.".to_string();
    }
    if err.downcast_ref::<EmptyGeneration>().is_some() {
        return "The model returned an empty response. Please try rephrasing your question."
            .to_string();
    }
    format!("Sorry, I couldn't process that query: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rival_radar_core::intent::{Aspect, Complexity};

    fn analysis(mentioned: &[&str], aspects: Vec<Aspect>, intent: Intent) -> QueryAnalysis {
        QueryAnalysis {
            intent,
            competitors_mentioned: mentioned.iter().map(|s| s.to_string()).collect(),
            aspects,
            action_keywords: Vec::new(),
            complexity: Complexity::Simple,
            sub_goals: Vec::new(),
        }
    }

    #[test]
    fn validation_rejects_short_and_blank_queries() {
        assert_eq!(validate_query(""), Err(QueryRejection::Empty));
        assert_eq!(validate_query("   \t "), Err(QueryRejection::Empty));
        assert_eq!(validate_query(" hi "), Err(QueryRejection::TooShort));
        assert_eq!(validate_query("  who leads?  "), Ok("who leads?"));
    }

    #[test]
    fn validation_rejects_overlong_queries() {
        let at_limit = "é".repeat(MAX_QUERY_CHARS);
        assert_eq!(validate_query(&at_limit), Ok(at_limit.as_str()));
        let over = "a".repeat(MAX_QUERY_CHARS + 1);
        assert_eq!(validate_query(&over), Err(QueryRejection::TooLong));
        // surrounding whitespace does not count
        let padded = format!("  {}  ", "a".repeat(MAX_QUERY_CHARS));
        assert!(validate_query(&padded).is_ok());
    }

    #[test]
    fn footer_prefers_mentioned_companies() {
        let a = analysis(
            &["TechCorp", "InnovateLabs"],
            vec![Aspect::Marketing],
            Intent::Comparison,
        );
        let f = footer(&a, &["DataDynamic".to_string()]);
        assert_eq!(
            f,
            "---\nCompanies: TechCorp, InnovateLabs | Focus: marketing | Intent: comparison"
        );
    }

    #[test]
    fn footer_falls_back_to_sources() {
        let a = analysis(&[], Vec::new(), Intent::General);
        assert_eq!(
            footer(&a, &["A".to_string(), "B".to_string()]),
            "---\nCompanies: A, B | Focus: general | Intent: general"
        );
        assert!(footer(&a, &[]).contains("Companies: none"));
    }

    #[test]
    fn provider_errors_map_to_friendly_text() {
        let rate = anyhow::Error::new(ProviderError::RateLimited);
        assert!(user_message(&rate).contains("Rate limit"));

        let auth = anyhow::Error::new(ProviderError::Auth { status: 401 });
        assert!(user_message(&auth).contains("COHERE_API_KEY"));

        let nested = anyhow::Error::new(RetrievalError::Embedding(
            ProviderError::Timeout(Duration::from_secs(30)).into(),
        ));
        assert!(user_message(&nested).contains("timed out"));

        let empty = anyhow::Error::new(RetrievalError::Empty);
        assert!(user_message(&empty).contains("No competitor data"));

        let other = anyhow::anyhow!("boom");
        assert!(user_message(&other).contains("boom"));
    }

    #[test]
    fn export_names_are_timestamped() {
        let name = default_export_name();
        assert!(name.starts_with("query_history_"));
        assert!(name.ends_with(".txt"));
        assert_eq!(name.len(), "query_history_20240101_120000.txt".len());
    }
}
