//! Lever ATS candidate source.
//!
//! Lever paginates with opaque `next` cursors, so a numeric offset is reached
//! by walking pages from the start. Runs are capped at a few hundred
//! candidates, which keeps the walk short.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::models::candidate::{CandidateRecord, ResumeDocument, PROCESSED_TAG};
use crate::sources::{CandidateSource, SourceError};

const LEVER_API_BASE: &str = "https://api.lever.co/v1";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    next: Option<String>,
    #[serde(rename = "hasNext", default)]
    has_next: bool,
}

#[derive(Debug, Deserialize)]
struct Stage {
    id: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Opportunity {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

impl From<Opportunity> for CandidateRecord {
    fn from(o: Opportunity) -> Self {
        CandidateRecord {
            candidate_identifier: o.id,
            display_name: o.name.unwrap_or_else(|| "unknown".to_string()),
            tag_set: o.tags.into_iter().collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResumeMeta {
    id: Option<String>,
}

/// Lists applicants in one pipeline stage of a posting.
pub struct LeverClient {
    client: Client,
    api_key: String,
    base_url: String,
    stage_name: String,
    stage_id: OnceCell<String>,
}

impl LeverClient {
    pub fn new(api_key: String, stage_name: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: LEVER_API_BASE.to_string(),
            stage_name,
            stage_id: OnceCell::new(),
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{path}", self.base_url))
            .basic_auth(&self.api_key, None::<&str>)
    }

    async fn checked(response: Response) -> Result<Response, SourceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(SourceError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn stage_id(&self) -> Result<&str, SourceError> {
        let id = self
            .stage_id
            .get_or_try_init(|| async {
                let response = Self::checked(self.get("/stages").send().await?).await?;
                let stages: Envelope<Stage> = response.json().await?;
                stages
                    .data
                    .into_iter()
                    .find(|s| s.text.eq_ignore_ascii_case(&self.stage_name))
                    .map(|s| s.id)
                    .ok_or_else(|| SourceError::StageNotFound(self.stage_name.clone()))
            })
            .await?;
        Ok(id.as_str())
    }

    async fn opportunities_page(
        &self,
        job_id: &str,
        stage_id: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<Envelope<Opportunity>, SourceError> {
        let mut params = vec![
            ("posting_id", job_id.to_string()),
            ("archived", "false".to_string()),
            ("stage_id", stage_id.to_string()),
            ("limit", limit.to_string()),
            ("sort", "-createdAt".to_string()),
        ];
        if let Some(cursor) = cursor {
            params.push(("offset", cursor.to_string()));
        }
        let response = Self::checked(self.get("/opportunities").query(&params).send().await?).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl CandidateSource for LeverClient {
    async fn list_page(
        &self,
        job_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<CandidateRecord>, SourceError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let stage_id = self.stage_id().await?;
        let mut cursor: Option<String> = None;
        let mut skipped_pages = offset / limit;

        loop {
            let page = self
                .opportunities_page(job_id, stage_id, limit, cursor.as_deref())
                .await?;
            if skipped_pages == 0 {
                return Ok(page.data.into_iter().map(CandidateRecord::from).collect());
            }
            match page.next {
                Some(next) if page.has_next => cursor = Some(next),
                _ => return Ok(Vec::new()),
            }
            skipped_pages -= 1;
        }
    }

    async fn fetch_resume(
        &self,
        candidate_id: &str,
    ) -> Result<Option<ResumeDocument>, SourceError> {
        let response =
            Self::checked(self.get(&format!("/opportunities/{candidate_id}/resumes")).send().await?)
                .await?;
        let resumes: Envelope<ResumeMeta> = response.json().await?;

        let Some(resume_id) = resumes.data.into_iter().find_map(|r| r.id) else {
            return Ok(None);
        };

        let path = format!("/opportunities/{candidate_id}/resumes/{resume_id}/download");
        let response = Self::checked(self.get(&path).send().await?).await?;
        Ok(Some(ResumeDocument {
            candidate_identifier: candidate_id.to_string(),
            raw_bytes: response.bytes().await?,
        }))
    }

    async fn mark_processed(&self, candidate_id: &str) -> bool {
        let result = self
            .client
            .post(format!("{}/opportunities/{candidate_id}/addTags", self.base_url))
            .basic_auth(&self.api_key, None::<&str>)
            .json(&serde_json::json!({ "tags": [PROCESSED_TAG] }))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                info!("Tagged candidate {candidate_id} as processed");
                true
            }
            Ok(response) => {
                warn!(
                    "Failed to tag candidate {candidate_id}: status {}",
                    response.status()
                );
                false
            }
            Err(e) => {
                warn!("Failed to tag candidate {candidate_id}: {e}");
                false
            }
        }
    }
}
