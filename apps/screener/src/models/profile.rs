use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A job the pipeline screens candidates for. Fixed for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct JobProfile {
    /// Short identifier (posting id or title) matched first when resolving a query.
    #[serde(rename = "job_posting")]
    #[sqlx(rename = "job_posting")]
    pub job_identifier: String,
    #[serde(rename = "job_description")]
    #[sqlx(rename = "job_description")]
    pub description_text: String,
    /// Recruiter-prioritised criteria appended to the scoring prompt.
    #[serde(rename = "recruiter_prompt")]
    #[sqlx(rename = "recruiter_prompt")]
    pub evaluator_instructions: String,
}

impl JobProfile {
    /// One-line preview of the description, used when listing profiles.
    pub fn preview(&self, max_chars: usize) -> String {
        let flat = self.description_text.replace(['\n', '\r'], " ");
        match flat.char_indices().nth(max_chars) {
            Some((idx, _)) => format!("{}...", &flat[..idx]),
            None => flat,
        }
    }
}
