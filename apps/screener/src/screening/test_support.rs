//! In-memory collaborators for exercising the pipeline without network or disk.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::TempDir;

use crate::extract::TextExtractor;
use crate::llm_client::{OracleError, ScoringOracle};
use crate::models::candidate::{CandidateRecord, ResumeDocument};
use crate::models::evaluation::{LedgerEntry, SinkRecord};
use crate::models::profile::JobProfile;
use crate::screening::pipeline::{BatchPipeline, CancelFlag, PipelineSettings};
use crate::screening::quota::tests::ManualClock;
use crate::screening::quota::{Clock, QuotaConfig, QuotaTracker};
use crate::screening::report::RunReport;
use crate::sources::{CandidateSource, SourceError};
use crate::state::ScreeningServices;
use crate::storage::{IdempotencyLedger, ProfileStore, ResultSink, StorageError};

pub(crate) const SHORTLIST_71: &str = "\
DECISION: SHORTLIST

SCORES:
1. Technical Skills & Experience: 42/60
   - Technical Skills: 12/15
   - Experience Level: 10/15
   - Tools & Technologies: 9/15
   - Domain Knowledge: 11/15

2. Impact & Achievements: 29/40
   - Quantifiable Impact: 15/20
   - Problem Solving: 14/20

TOTAL SCORE: 71
";

const CORRUPT_BYTES: &[u8] = b"corrupt";

pub(crate) fn profile() -> JobProfile {
    JobProfile {
        job_identifier: "senior backend".to_string(),
        description_text: "Senior Backend Engineer - Rust, Postgres, distributed systems".to_string(),
        evaluator_instructions: "Prioritise production ownership.".to_string(),
    }
}

/// `cand-000`, `cand-001`, ... in source order.
pub(crate) fn candidates(n: usize) -> Vec<CandidateRecord> {
    (0..n)
        .map(|i| CandidateRecord::new(format!("cand-{i:03}"), format!("Candidate {i}")))
        .collect()
}

type Events = Arc<Mutex<Vec<String>>>;

fn io_error(message: &str) -> StorageError {
    StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, message.to_string()))
}

// ── Oracle ──────────────────────────────────────────────────────────────────

/// Replays queued responses in order, then answers `SHORTLIST_71` forever.
pub(crate) struct ScriptedOracle {
    script: Mutex<VecDeque<Result<String, OracleError>>>,
    calls: AtomicUsize,
    cancel_after: Mutex<Option<(usize, CancelFlag)>>,
}

impl ScriptedOracle {
    pub(crate) fn new(script: Vec<Result<String, OracleError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            cancel_after: Mutex::new(None),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn push_ok(&self, text: &str) {
        self.script.lock().unwrap().push_back(Ok(text.to_string()));
    }

    pub(crate) fn push_errors(&self, errors: impl IntoIterator<Item = OracleError>) {
        self.script.lock().unwrap().extend(errors.into_iter().map(Err));
    }

    /// Trips `flag` once `calls` scoring calls have been answered.
    pub(crate) fn cancel_after(&self, calls: usize, flag: CancelFlag) {
        *self.cancel_after.lock().unwrap() = Some((calls, flag));
    }
}

#[async_trait]
impl ScoringOracle for ScriptedOracle {
    async fn score(&self, _profile: &JobProfile, _text: &str) -> Result<String, OracleError> {
        let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, flag)) = self.cancel_after.lock().unwrap().as_ref() {
            if calls >= *after {
                flag.cancel();
            }
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(SHORTLIST_71.to_string()))
    }
}

// ── Source ──────────────────────────────────────────────────────────────────

pub(crate) struct FakeSource {
    records: Vec<CandidateRecord>,
    offsets: Mutex<Vec<usize>>,
    missing: Mutex<HashSet<String>>,
    corrupt: Mutex<HashSet<String>>,
    failing_offset: Mutex<Option<usize>>,
    events: Events,
}

impl FakeSource {
    fn new(records: Vec<CandidateRecord>, events: Events) -> Self {
        Self {
            records,
            offsets: Mutex::new(Vec::new()),
            missing: Mutex::new(HashSet::new()),
            corrupt: Mutex::new(HashSet::new()),
            failing_offset: Mutex::new(None),
            events,
        }
    }

    /// Listing the page at `offset` fails with an API error.
    pub(crate) fn fail_listing_at(&self, offset: usize) {
        *self.failing_offset.lock().unwrap() = Some(offset);
    }

    pub(crate) fn list_offsets(&self) -> Vec<usize> {
        self.offsets.lock().unwrap().clone()
    }

    pub(crate) fn without_resume(&self, candidate_id: &str) {
        self.missing.lock().unwrap().insert(candidate_id.to_string());
    }

    pub(crate) fn with_corrupt_resume(&self, candidate_id: &str) {
        self.corrupt.lock().unwrap().insert(candidate_id.to_string());
    }
}

#[async_trait]
impl CandidateSource for FakeSource {
    async fn list_page(
        &self,
        _job_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<CandidateRecord>, SourceError> {
        self.offsets.lock().unwrap().push(offset);
        if *self.failing_offset.lock().unwrap() == Some(offset) {
            return Err(SourceError::Api {
                status: 502,
                message: "bad gateway".to_string(),
            });
        }
        Ok(self.records.iter().skip(offset).take(limit).cloned().collect())
    }

    async fn fetch_resume(&self, candidate_id: &str) -> Result<Option<ResumeDocument>, SourceError> {
        if self.missing.lock().unwrap().contains(candidate_id) {
            return Ok(None);
        }
        let raw_bytes = if self.corrupt.lock().unwrap().contains(candidate_id) {
            Bytes::from_static(CORRUPT_BYTES)
        } else {
            Bytes::from(format!("Resume of {candidate_id}: Rust, Postgres, Kubernetes"))
        };
        Ok(Some(ResumeDocument {
            candidate_identifier: candidate_id.to_string(),
            raw_bytes,
        }))
    }

    async fn mark_processed(&self, candidate_id: &str) -> bool {
        self.events.lock().unwrap().push(format!("mark:{candidate_id}"));
        true
    }
}

/// Treats the bytes as UTF-8 text; `CORRUPT_BYTES` yields nothing.
pub(crate) struct FakeExtractor;

#[async_trait]
impl TextExtractor for FakeExtractor {
    async fn extract(&self, raw: Bytes) -> Option<String> {
        if raw.as_ref() == CORRUPT_BYTES {
            return None;
        }
        String::from_utf8(raw.to_vec()).ok()
    }
}

// ── Storage ─────────────────────────────────────────────────────────────────

pub(crate) struct FixedProfiles(pub Vec<JobProfile>);

#[async_trait]
impl ProfileStore for FixedProfiles {
    async fn list_profiles(&self) -> Result<Vec<JobProfile>, StorageError> {
        Ok(self.0.clone())
    }
}

pub(crate) struct MemoryLedger {
    entries: Mutex<Vec<(String, String)>>,
    failing_appends: Mutex<HashSet<String>>,
    failing_lookups: Mutex<HashSet<String>>,
    events: Events,
}

impl MemoryLedger {
    pub(crate) fn fail_append_for(&self, candidate_id: &str) {
        self.failing_appends
            .lock()
            .unwrap()
            .insert(candidate_id.to_string());
    }

    pub(crate) fn fail_lookup_for(&self, candidate_id: &str) {
        self.failing_lookups
            .lock()
            .unwrap()
            .insert(candidate_id.to_string());
    }

    /// Lets every later append and lookup succeed again.
    pub(crate) fn heal(&self) {
        self.failing_appends.lock().unwrap().clear();
        self.failing_lookups.lock().unwrap().clear();
    }

    pub(crate) fn seed(&self, job_id: &str, candidate_id: &str) {
        self.entries
            .lock()
            .unwrap()
            .push((job_id.to_string(), candidate_id.to_string()));
    }

    pub(crate) fn has(&self, job_id: &str, candidate_id: &str) -> bool {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .any(|(j, c)| j == job_id && c == candidate_id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[async_trait]
impl IdempotencyLedger for MemoryLedger {
    async fn contains(&self, job_id: &str, candidate_id: &str) -> Result<bool, StorageError> {
        if self.failing_lookups.lock().unwrap().contains(candidate_id) {
            return Err(io_error("ledger unreadable"));
        }
        Ok(self.has(job_id, candidate_id))
    }

    async fn append(&self, entry: &LedgerEntry) -> Result<(), StorageError> {
        if self
            .failing_appends
            .lock()
            .unwrap()
            .contains(&entry.candidate_identifier)
        {
            return Err(io_error("ledger read-only"));
        }
        self.events
            .lock()
            .unwrap()
            .push(format!("ledger:{}", entry.candidate_identifier));
        self.seed(&entry.job_identifier, &entry.candidate_identifier);
        Ok(())
    }
}

pub(crate) struct MemorySink {
    records: Mutex<Vec<SinkRecord>>,
    failing: Mutex<HashSet<String>>,
    events: Events,
}

impl MemorySink {
    pub(crate) fn fail_for(&self, candidate_id: &str) {
        self.failing.lock().unwrap().insert(candidate_id.to_string());
    }

    pub(crate) fn records(&self) -> Vec<SinkRecord> {
        self.records.lock().unwrap().clone()
    }

    pub(crate) fn candidate_ids(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .map(|r| r.candidate_identifier)
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn append(&self, record: &SinkRecord) -> Result<(), StorageError> {
        if self.failing.lock().unwrap().contains(&record.candidate_identifier) {
            return Err(io_error("disk full"));
        }
        self.events
            .lock()
            .unwrap()
            .push(format!("sink:{}", record.candidate_identifier));
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

// ── Harness ─────────────────────────────────────────────────────────────────

/// Shared fakes for one test. Each `pipeline()` call is a fresh run over the
/// same source, ledger and sink.
pub(crate) struct Harness {
    pub source: Arc<FakeSource>,
    pub oracle: Arc<ScriptedOracle>,
    pub ledger: Arc<MemoryLedger>,
    pub sink: Arc<MemorySink>,
    pub clock: Arc<ManualClock>,
    pub cancel: CancelFlag,
    events: Events,
    report_dir: TempDir,
}

impl Harness {
    pub(crate) fn new(records: Vec<CandidateRecord>) -> Self {
        let events: Events = Arc::default();
        Self {
            source: Arc::new(FakeSource::new(records, events.clone())),
            oracle: Arc::new(ScriptedOracle::new(Vec::new())),
            ledger: Arc::new(MemoryLedger {
                entries: Mutex::new(Vec::new()),
                failing_appends: Mutex::new(HashSet::new()),
                failing_lookups: Mutex::new(HashSet::new()),
                events: events.clone(),
            }),
            sink: Arc::new(MemorySink {
                records: Mutex::new(Vec::new()),
                failing: Mutex::new(HashSet::new()),
                events: events.clone(),
            }),
            clock: Arc::new(ManualClock::new()),
            cancel: CancelFlag::default(),
            events,
            report_dir: TempDir::new().unwrap(),
        }
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn services(&self) -> ScreeningServices {
        ScreeningServices {
            profiles: Arc::new(FixedProfiles(vec![profile()])),
            source: self.source.clone(),
            extractor: Arc::new(FakeExtractor),
            oracle: self.oracle.clone(),
            ledger: self.ledger.clone(),
            sink: self.sink.clone(),
            clock: self.clock.clone(),
        }
    }

    /// A new run with its own quota window and report file.
    pub(crate) fn pipeline(&self, settings: PipelineSettings, max_requests: u32) -> BatchPipeline {
        // Distinct report timestamps per run.
        self.clock.advance(chrono::Duration::seconds(1));
        let quota = QuotaTracker::new(
            QuotaConfig {
                max_requests,
                ..QuotaConfig::default()
            },
            self.clock.clone(),
        );
        let report = RunReport::for_run(self.report_dir.path(), self.clock.now());
        BatchPipeline::new(self.services(), settings, quota, report, self.cancel.clone())
    }
}
