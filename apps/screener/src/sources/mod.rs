//! Candidate sources: where applicants and their resumes come from.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::candidate::{CandidateRecord, ResumeDocument};

pub mod lever;
pub mod local;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stage '{0}' not found")]
    StageNotFound(String),
}

#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// One page of candidates for `job_id`, newest first.
    async fn list_page(
        &self,
        job_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<CandidateRecord>, SourceError>;

    /// The candidate's resume, or `None` when they have not uploaded one.
    async fn fetch_resume(&self, candidate_id: &str)
        -> Result<Option<ResumeDocument>, SourceError>;

    /// Best-effort marker at the source. Failures are reported as `false`.
    async fn mark_processed(&self, candidate_id: &str) -> bool;
}
