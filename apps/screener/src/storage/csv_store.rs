//! CSV-file backend. One file per table; the header row is the schema.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::models::evaluation::{LedgerEntry, SinkRecord};
use crate::models::profile::JobProfile;
use crate::storage::{
    IdempotencyLedger, ProfileStore, ProvisionedTable, ResultSink, StorageError,
};

pub const LEDGER_FILE: &str = "processed.csv";
pub const RESULTS_FILE: &str = "results.csv";
pub const PROFILES_FILE: &str = "job_profiles.csv";

const LEDGER_HEADER: &[&str] = &["job_id", "candidate_id", "processed_at"];
const RESULTS_HEADER: &[&str] = &[
    "job_id",
    "candidate_id",
    "decision",
    "score",
    "scores",
    "explanation",
    "recorded_at",
];

fn is_not_found(err: &csv::Error) -> bool {
    matches!(err.kind(), csv::ErrorKind::Io(io) if io.kind() == ErrorKind::NotFound)
}

/// Appends one record to an existing file. A missing or empty file has no
/// header row yet and is reported as `MissingSchema`.
fn append_record(path: &Path, record: &[String]) -> Result<(), StorageError> {
    let file = match OpenOptions::new().append(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(StorageError::MissingSchema(path.display().to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    if file.metadata()?.len() == 0 {
        return Err(StorageError::MissingSchema(path.display().to_string()));
    }
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer.write_record(record)?;
    writer.flush()?;
    Ok(())
}

/// Writes the header row into a missing or empty file. A file that already
/// has content is left alone.
fn provision_file(path: &Path, header: &[&str]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    if file.metadata()?.len() > 0 {
        return Ok(());
    }
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(header)?;
    writer.flush()?;
    info!("Wrote header row to {}", path.display());
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Ledger
// ────────────────────────────────────────────────────────────────────────────

pub struct CsvLedger {
    path: PathBuf,
}

impl CsvLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ProvisionedTable<LedgerEntry> for CsvLedger {
    async fn insert_row(&self, entry: &LedgerEntry) -> Result<(), StorageError> {
        append_record(
            &self.path,
            &[
                entry.job_identifier.clone(),
                entry.candidate_identifier.clone(),
                entry.recorded_at.to_rfc3339(),
            ],
        )
    }

    async fn provision(&self) -> Result<(), StorageError> {
        provision_file(&self.path, LEDGER_HEADER)
    }
}

#[async_trait]
impl IdempotencyLedger for CsvLedger {
    async fn contains(&self, job_id: &str, candidate_id: &str) -> Result<bool, StorageError> {
        let mut reader = match csv::Reader::from_path(&self.path) {
            Ok(reader) => reader,
            Err(e) if is_not_found(&e) => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        for record in reader.records() {
            let record = record?;
            if record.get(0) == Some(job_id) && record.get(1) == Some(candidate_id) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn append(&self, entry: &LedgerEntry) -> Result<(), StorageError> {
        self.insert_provisioned(entry).await
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Result sink
// ────────────────────────────────────────────────────────────────────────────

pub struct CsvResultSink {
    path: PathBuf,
}

impl CsvResultSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ProvisionedTable<SinkRecord> for CsvResultSink {
    async fn insert_row(&self, record: &SinkRecord) -> Result<(), StorageError> {
        append_record(
            &self.path,
            &[
                record.job_identifier.clone(),
                record.candidate_identifier.clone(),
                record.decision.as_str().to_string(),
                record.total_score.to_string(),
                serde_json::to_string(&record.breakdown)?,
                record.explanation.clone(),
                record.recorded_at.to_rfc3339(),
            ],
        )
    }

    async fn provision(&self) -> Result<(), StorageError> {
        provision_file(&self.path, RESULTS_HEADER)
    }
}

#[async_trait]
impl ResultSink for CsvResultSink {
    async fn append(&self, record: &SinkRecord) -> Result<(), StorageError> {
        self.insert_provisioned(record).await
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Profiles
// ────────────────────────────────────────────────────────────────────────────

/// Reads `job_posting,job_description,recruiter_prompt` rows in file order.
/// Rows with fewer than three columns are ignored.
pub struct CsvProfileStore {
    path: PathBuf,
}

impl CsvProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ProfileStore for CsvProfileStore {
    async fn list_profiles(&self) -> Result<Vec<JobProfile>, StorageError> {
        let mut reader = match csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)
        {
            Ok(reader) => reader,
            Err(e) if is_not_found(&e) => {
                return Err(StorageError::MissingSchema(self.path.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let mut profiles = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.len() < 3 {
                continue;
            }
            profiles.push(JobProfile {
                job_identifier: record[0].to_string(),
                description_text: record[1].to_string(),
                evaluator_instructions: record[2].to_string(),
            });
        }
        Ok(profiles)
    }
}
