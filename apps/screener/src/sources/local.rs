//! Resumes dropped into a local directory, one file per candidate.
//!
//! The file name is the candidate id and the stem is the display name.
//! Newest files come first, matching the ATS ordering.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::models::candidate::{CandidateRecord, ResumeDocument};
use crate::sources::{CandidateSource, SourceError};

const RESUME_EXTENSIONS: &[&str] = &["pdf"];

pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn list_resumes(&self) -> Result<Vec<(SystemTime, String)>, SourceError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_resume(&path) {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((modified, entry.file_name().to_string_lossy().into_owned()));
        }
        files.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        Ok(files)
    }
}

fn is_resume(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| RESUME_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

#[async_trait]
impl CandidateSource for DirectorySource {
    async fn list_page(
        &self,
        _job_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<CandidateRecord>, SourceError> {
        Ok(self
            .list_resumes()
            .await?
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, file_name)| {
                let stem = Path::new(&file_name)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file_name.clone());
                CandidateRecord::new(file_name, stem)
            })
            .collect())
    }

    async fn fetch_resume(
        &self,
        candidate_id: &str,
    ) -> Result<Option<ResumeDocument>, SourceError> {
        // Ids come from our own listing; refuse anything that could escape the directory.
        if Path::new(candidate_id).components().count() != 1 {
            return Ok(None);
        }
        match tokio::fs::read(self.dir.join(candidate_id)).await {
            Ok(raw) => Ok(Some(ResumeDocument {
                candidate_identifier: candidate_id.to_string(),
                raw_bytes: Bytes::from(raw),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn mark_processed(&self, candidate_id: &str) -> bool {
        debug!("Local source has no tags; {candidate_id} tracked by the ledger only");
        true
    }
}
