//! Cohere API client.
//!
//! [`CohereClient`] implements both [`Embedder`] and [`Generator`] against
//! the Cohere v1 HTTP API:
//!
//! | Call | Endpoint | Body |
//! |------|----------|------|
//! | embed | `POST {base}/v1/embed` | `{model, texts, input_type, truncate: "END"}` |
//! | chat | `POST {base}/v1/chat` | `{model, message, preamble, temperature, max_tokens, p}` |
//!
//! One `reqwest::Client` is shared by both calls and carries the configured
//! timeout. Failures are reported as [`ProviderError`] so callers can turn
//! them into precise user-facing messages. Nothing is retried here.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use rival_radar_core::embedding::{Embedder, InputType};
use rival_radar_core::prompt::{GenerationRequest, Generator};

use crate::config::ProviderConfig;

/// Longest slice of an error body kept in [`ProviderError::Api`].
const MAX_ERROR_BODY: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("authentication failed (HTTP {status}): check COHERE_API_KEY")]
    Auth { status: u16 },

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Parse(String),
}

impl ProviderError {
    /// Map a non-success HTTP status and its body to an error kind.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 | 403 => ProviderError::Auth {
                status: status.as_u16(),
            },
            429 => ProviderError::RateLimited,
            code => ProviderError::Api {
                status: code,
                body: error_message(body),
            },
        }
    }
}

/// Pull `message` out of a JSON error body, else a bounded slice of the raw text.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.message,
        Err(_) => body.trim().chars().take(MAX_ERROR_BODY).collect(),
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    texts: &'a [String],
    input_type: &'static str,
    truncate: &'static str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    message: &'a str,
    preamble: &'a str,
    temperature: f32,
    max_tokens: u32,
    p: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    text: String,
}

/// Embedding and chat client for the Cohere API.
pub struct CohereClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    embed_model: String,
    chat_model: String,
    timeout: Duration,
}

impl CohereClient {
    pub fn new(config: &ProviderConfig, api_key: impl Into<String>) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            embed_model: config.embed_model.clone(),
            chat_model: config.chat_model.clone(),
            timeout,
        })
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, ProviderError>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let err = ProviderError::from_status(status, &text);
            tracing::warn!(%url, status = status.as_u16(), error = %err, "provider call failed");
            return Err(err);
        }

        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;
        serde_json::from_str(&text).map_err(|e| ProviderError::Parse(e.to_string()))
    }

    fn transport_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(self.timeout)
        } else {
            ProviderError::Network(err)
        }
    }
}

#[async_trait]
impl Embedder for CohereClient {
    fn model_name(&self) -> &str {
        &self.embed_model
    }

    async fn embed(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!(count = texts.len(), %input_type, model = %self.embed_model, "embedding texts");
        let body = EmbedRequest {
            model: &self.embed_model,
            texts,
            input_type: input_type.as_str(),
            truncate: "END",
        };
        let response: EmbedResponse = self.post("/v1/embed", &body).await?;
        if response.embeddings.len() != texts.len() {
            return Err(ProviderError::Parse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                response.embeddings.len()
            ))
            .into());
        }
        Ok(response.embeddings)
    }
}

#[async_trait]
impl Generator for CohereClient {
    fn model_name(&self) -> &str {
        &self.chat_model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        tracing::debug!(model = %self.chat_model, chars = request.message.len(), "requesting generation");
        let body = ChatRequest {
            model: &self.chat_model,
            message: &request.message,
            preamble: &request.preamble,
            temperature: request.params.temperature,
            max_tokens: request.params.max_tokens,
            p: request.params.p,
        };
        let response: ChatResponse = self.post("/v1/chat", &body).await?;
        Ok(response.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rival_radar_core::prompt::SamplingParams;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> CohereClient {
        let config = ProviderConfig {
            base_url: server.uri(),
            timeout_secs: 5,
            ..ProviderConfig::default()
        };
        CohereClient::new(&config, "test-key").unwrap()
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            preamble: "be brief".to_string(),
            message: "hello".to_string(),
            params: SamplingParams::default(),
        }
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            ProviderError::from_status(StatusCode::UNAUTHORIZED, ""),
            ProviderError::Auth { status: 401 }
        ));
        assert!(matches!(
            ProviderError::from_status(StatusCode::FORBIDDEN, ""),
            ProviderError::Auth { status: 403 }
        ));
        assert!(matches!(
            ProviderError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ProviderError::RateLimited
        ));
        match ProviderError::from_status(StatusCode::BAD_REQUEST, r#"{"message":"invalid model"}"#) {
            ProviderError::Api { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "invalid model");
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn raw_error_bodies_are_bounded() {
        let long = "x".repeat(MAX_ERROR_BODY * 2);
        assert_eq!(error_message(&long).len(), MAX_ERROR_BODY);
    }

    #[tokio::test]
    async fn embed_sends_input_type_and_parses_vectors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embed"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "input_type": "search_query",
                "truncate": "END",
                "texts": ["what is up"],
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "1", "embeddings": [[0.1, 0.2]]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let vectors = client_for(&server)
            .embed(&["what is up".to_string()], InputType::SearchQuery)
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![0.1f32, 0.2]]);
    }

    #[tokio::test]
    async fn embed_rejects_wrong_vector_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embed"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"embeddings": [[1.0]]})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .embed(&["a".to_string(), "b".to_string()], InputType::SearchDocument)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProviderError>(),
            Some(ProviderError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn chat_sends_sampling_params() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat"))
            .and(body_partial_json(serde_json::json!({
                "message": "hello",
                "preamble": "be brief",
                "max_tokens": 512,
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "hi there"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let text = client_for(&server).generate(&request()).await.unwrap();
        assert_eq!(text, "hi there");
    }

    #[tokio::test]
    async fn chat_maps_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = client_for(&server).generate(&request()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProviderError>(),
            Some(ProviderError::RateLimited)
        ));
    }

    #[tokio::test]
    async fn malformed_success_body_is_a_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server).generate(&request()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProviderError>(),
            Some(ProviderError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn slow_responses_time_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"text": "late"}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let config = ProviderConfig {
            base_url: server.uri(),
            timeout_secs: 1,
            ..ProviderConfig::default()
        };
        let client = CohereClient::new(&config, "k").unwrap();
        let err = client.generate(&request()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProviderError>(),
            Some(ProviderError::Timeout(_))
        ));
    }
}
