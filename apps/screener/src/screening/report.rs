//! Per-run results file, appended after every page and on early halt.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::models::evaluation::EvaluationResult;
use crate::storage::StorageError;

#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    candidate_id: &'a str,
    decision: &'a str,
    score: u32,
    scores: String,
    explanation: &'a str,
}

pub struct RunReport {
    path: PathBuf,
    rows_written: usize,
}

impl RunReport {
    /// Report named after the run's start time, e.g. `evaluation_results_20250301_090000.csv`.
    pub fn for_run(dir: &Path, started_at: DateTime<Utc>) -> Self {
        let name = format!(
            "evaluation_results_{}.csv",
            started_at.format("%Y%m%d_%H%M%S")
        );
        Self {
            path: dir.join(name),
            rows_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Appends one page of results. The header is written with the first rows.
    pub fn append_page(&mut self, results: &[EvaluationResult]) -> Result<(), StorageError> {
        if results.is_empty() {
            warn!("No results to save");
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let is_new = file.metadata()?.len() == 0;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(file);

        for result in results {
            writer.serialize(ReportRow {
                candidate_id: &result.candidate_identifier,
                decision: result.decision.as_str(),
                score: result.total_score,
                scores: result.breakdown.to_json(),
                explanation: &result.raw_explanation_text,
            })?;
        }
        writer.flush()?;

        self.rows_written += results.len();
        info!(
            "Saved {} result(s) to {} ({} this run)",
            results.len(),
            self.path.display(),
            self.rows_written
        );
        Ok(())
    }

    /// Candidate ids of every row written so far, in file order.
    #[cfg(test)]
    pub fn read_candidate_ids(&self) -> Result<Vec<String>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut ids = Vec::new();
        for record in reader.records() {
            ids.push(record?[0].to_string());
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::evaluation::{Decision, ScoreBreakdown};

    fn result(id: &str) -> EvaluationResult {
        EvaluationResult {
            candidate_identifier: id.to_string(),
            decision: Decision::Reject,
            total_score: 40,
            breakdown: ScoreBreakdown::default(),
            raw_explanation_text: "DECISION: REJECT".to_string(),
        }
    }

    #[test]
    fn test_file_name_uses_run_start() {
        let started = DateTime::parse_from_rfc3339("2025-03-01T09:05:07Z")
            .unwrap()
            .with_timezone(&Utc);
        let report = RunReport::for_run(Path::new("out"), started);
        assert_eq!(
            report.path(),
            Path::new("out/evaluation_results_20250301_090507.csv")
        );
    }

    #[test]
    fn test_pages_append_under_single_header() {
        let dir = tempfile::tempdir().unwrap();
        let mut report = RunReport::for_run(dir.path(), Utc::now());

        report.append_page(&[result("a"), result("b")]).unwrap();
        report.append_page(&[result("c")]).unwrap();

        let content = std::fs::read_to_string(report.path()).unwrap();
        assert!(content.starts_with("candidate_id,decision,score,scores,explanation"));
        assert_eq!(content.matches("candidate_id").count(), 1);
        assert_eq!(report.read_candidate_ids().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(report.rows_written(), 3);
    }

    #[test]
    fn test_empty_page_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut report = RunReport::for_run(dir.path(), Utc::now());
        report.append_page(&[]).unwrap();
        assert!(!report.path().exists());
    }
}
