//! LLM client: the scoring oracle used by the screening pipeline.
//!
//! Every call to the generative model goes through `ScoringOracle`; the
//! pipeline never talks HTTP itself. `GeminiClient` is the default backend.
//!
//! This client makes exactly one attempt per call. Backoff and quota policy
//! live in `screening::retry` so they can be driven without real requests.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::profile::JobProfile;

pub mod prompts;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Markers the API puts in a 429 body when the per-day quota, not the
/// per-minute rate, is exhausted.
const DAILY_QUOTA_MARKERS: &[&str] = &["quota_value: 1000", "\"quotaValue\": \"1000\"", "PerDay"];

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("rate limited (daily quota exhausted: {quota_exhausted}): {message}")]
    RateLimited {
        quota_exhausted: bool,
        message: String,
    },

    #[error("scoring service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("scoring request timed out")]
    Timeout,

    #[error("scoring failed: {0}")]
    Other(String),
}

/// Produces a free-text evaluation of a candidate against a job profile.
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    async fn score(&self, profile: &JobProfile, candidate_text: &str)
        -> Result<String, OracleError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

/// Deterministic sampling so re-runs over the same resume agree.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    pub prompt_token_count: Option<u32>,
    pub candidates_token_count: Option<u32>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate, trimmed.
    pub fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

/// Gemini `generateContent` client.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()?,
            api_key,
            model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                top_p: 0.1,
                top_k: 1,
            },
        };

        let url = format!("{GEMINI_API_BASE}/{}:generateContent", self.model);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Other(format!("invalid response body: {e}")))?;

        if let Some(usage) = &parsed.usage_metadata {
            debug!(
                "Gemini call succeeded: prompt_tokens={:?}, output_tokens={:?}",
                usage.prompt_token_count, usage.candidates_token_count
            );
        }

        parsed
            .text()
            .ok_or_else(|| OracleError::Other("model returned empty content".to_string()))
    }
}

#[async_trait]
impl ScoringOracle for GeminiClient {
    async fn score(
        &self,
        profile: &JobProfile,
        candidate_text: &str,
    ) -> Result<String, OracleError> {
        let prompt = prompts::build_evaluation_prompt(profile, candidate_text);
        self.generate(&prompt).await
    }
}

fn classify_transport_error(err: reqwest::Error) -> OracleError {
    if err.is_timeout() {
        OracleError::Timeout
    } else if err.is_connect() {
        OracleError::ServiceUnavailable(err.to_string())
    } else {
        OracleError::Other(err.to_string())
    }
}

fn classify_status(status: StatusCode, body: String) -> OracleError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => OracleError::RateLimited {
            quota_exhausted: is_daily_quota(&body),
            message: body,
        },
        StatusCode::SERVICE_UNAVAILABLE => OracleError::ServiceUnavailable(body),
        StatusCode::GATEWAY_TIMEOUT | StatusCode::REQUEST_TIMEOUT => OracleError::Timeout,
        _ => OracleError::Other(format!("status {}: {body}", status.as_u16())),
    }
}

fn is_daily_quota(body: &str) -> bool {
    DAILY_QUOTA_MARKERS.iter().any(|m| body.contains(m))
}
