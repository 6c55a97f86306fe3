use std::collections::BTreeSet;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Tag the candidate source applies once a candidate has been screened.
pub const PROCESSED_TAG: &str = "processed";

/// An applicant as listed by the candidate source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub candidate_identifier: String,
    pub display_name: String,
    #[serde(default)]
    pub tag_set: BTreeSet<String>,
}

impl CandidateRecord {
    pub fn new(candidate_identifier: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            candidate_identifier: candidate_identifier.into(),
            display_name: display_name.into(),
            tag_set: BTreeSet::new(),
        }
    }

    #[cfg(test)]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag_set.insert(tag.into());
        self
    }

    /// True when the source already marks this candidate as screened.
    pub fn is_marked_processed(&self) -> bool {
        self.tag_set
            .iter()
            .any(|t| t.trim().eq_ignore_ascii_case(PROCESSED_TAG))
    }
}

/// Raw resume bytes for one candidate. Lives for a single pipeline iteration only.
#[derive(Debug, Clone)]
pub struct ResumeDocument {
    pub candidate_identifier: String,
    pub raw_bytes: Bytes,
}
