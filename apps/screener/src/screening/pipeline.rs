//! Batch screening pipeline.
//!
//! Flow: select job → page through candidates → skip already-screened →
//!       extract text → score (quota + retry) → parse → sink → ledger → next.
//!
//! One candidate is in flight at a time. The result sink is always written
//! before the ledger, so a crash can duplicate a result on the next run but can
//! never leave a ledger mark without a result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::candidate::CandidateRecord;
use crate::models::evaluation::{EvaluationResult, LedgerEntry, SinkRecord};
use crate::models::profile::JobProfile;
use crate::screening::job_match::resolve_profile;
use crate::screening::parser::parse_response;
use crate::screening::quota::QuotaTracker;
use crate::screening::report::RunReport;
use crate::screening::retry::{score_with_retry, RetryPolicy};
use crate::state::ScreeningServices;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub page_size: usize,
    /// Ceiling on processed + skipped candidates per run.
    pub max_candidates: usize,
    /// Flat wait before each candidate's first scoring call.
    pub pacing_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            page_size: 50,
            max_candidates: 600,
            pacing_delay: Duration::from_secs(4),
            retry: RetryPolicy::default(),
        }
    }
}

/// Cooperative interruption, checked between candidates.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    /// Empty or short page: nothing left to screen.
    SourceExhausted,
    CeilingReached,
    QuotaExhausted,
    Cancelled,
    SourceUnavailable,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub job_identifier: String,
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub pages: usize,
    pub halt: HaltReason,
}

impl RunSummary {
    /// Candidates that count towards the per-run ceiling.
    fn counted(&self) -> usize {
        self.processed + self.skipped
    }
}

enum CandidateOutcome {
    Processed(EvaluationResult),
    /// Carries the result when scoring succeeded but persisting it did not.
    Failed(Option<EvaluationResult>),
    Skipped,
    Halt(HaltReason),
}

pub struct BatchPipeline {
    services: ScreeningServices,
    settings: PipelineSettings,
    quota: QuotaTracker,
    report: RunReport,
    cancel: CancelFlag,
}

impl BatchPipeline {
    pub fn new(
        services: ScreeningServices,
        settings: PipelineSettings,
        quota: QuotaTracker,
        report: RunReport,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            services,
            settings,
            quota,
            report,
            cancel,
        }
    }

    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Resolves `query` to a job profile and screens its candidates.
    /// Only configuration problems are returned as errors.
    pub async fn run(&mut self, query: &str) -> Result<RunSummary, AppError> {
        let profile = self.select_job(query).await?;
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id, job_id = %profile.job_identifier);
        Ok(self.screen(&profile, run_id).instrument(span).await)
    }

    pub async fn select_job(&self, query: &str) -> Result<JobProfile, AppError> {
        let profiles = self.services.profiles.list_profiles().await?;
        info!("Resolving job query '{query}' against {} profile(s)", profiles.len());

        let Some((profile, strategy)) = resolve_profile(&profiles, query) else {
            error!("No job profile matches '{query}'. Available profiles:");
            for (idx, p) in profiles.iter().enumerate() {
                info!("{}. [{}] {}", idx + 1, p.job_identifier, p.preview(120));
            }
            return Err(AppError::NoMatchingProfile {
                query: query.to_string(),
                available: profiles.len(),
            });
        };

        info!(
            "Selected job '{}' (matched by {strategy}): {}",
            profile.job_identifier,
            profile.preview(200)
        );
        Ok(profile.clone())
    }

    async fn screen(&mut self, profile: &JobProfile, run_id: Uuid) -> RunSummary {
        let job_id = profile.job_identifier.as_str();
        let page_size = self.settings.page_size.max(1);
        let mut summary = RunSummary {
            run_id,
            job_identifier: job_id.to_string(),
            processed: 0,
            failed: 0,
            skipped: 0,
            pages: 0,
            halt: HaltReason::SourceExhausted,
        };
        let mut offset = 0usize;

        let halt = loop {
            if summary.counted() >= self.settings.max_candidates {
                info!("Reached maximum of {} candidates", self.settings.max_candidates);
                break HaltReason::CeilingReached;
            }
            if self.cancel.is_cancelled() {
                warn!("Run interrupted before offset {offset}");
                break HaltReason::Cancelled;
            }
            if !self.quota.can_proceed() {
                error!("Request quota exhausted for this window; stopping before offset {offset}");
                break HaltReason::QuotaExhausted;
            }

            let page = match self
                .services
                .source
                .list_page(job_id, offset, page_size)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    error!(job_id, offset, "Failed to list candidates: {e}");
                    break HaltReason::SourceUnavailable;
                }
            };
            if page.is_empty() {
                info!("No more candidates after offset {offset}");
                break HaltReason::SourceExhausted;
            }
            summary.pages += 1;
            info!("Fetched {} candidate(s) at offset {offset}", page.len());

            let before = (summary.processed, summary.failed, summary.skipped);
            let mut results = Vec::new();
            let page_halt = self
                .screen_page(profile, &page, offset, &mut summary, &mut results)
                .await;

            self.drain(&results, offset);
            info!(
                "Page summary (offset {offset}): processed={}, failed={}, skipped={}, \
                 total processed={}, total skipped={}, remaining before limit={}",
                summary.processed - before.0,
                summary.failed - before.1,
                summary.skipped - before.2,
                summary.processed,
                summary.skipped,
                self.settings.max_candidates.saturating_sub(summary.counted())
            );

            if let Some(reason) = page_halt {
                break reason;
            }
            offset += page_size;
            if page.len() < page_size {
                break HaltReason::SourceExhausted;
            }
        };

        summary.halt = halt;
        info!(
            "Run finished ({:?}): processed={}, failed={}, skipped={}, pages={}, \
             requests used={}, remaining={}",
            summary.halt,
            summary.processed,
            summary.failed,
            summary.skipped,
            summary.pages,
            self.quota.state().requests_used,
            self.quota.remaining()
        );
        summary
    }

    async fn screen_page(
        &mut self,
        profile: &JobProfile,
        page: &[CandidateRecord],
        offset: usize,
        summary: &mut RunSummary,
        results: &mut Vec<EvaluationResult>,
    ) -> Option<HaltReason> {
        for record in page {
            if summary.counted() >= self.settings.max_candidates {
                info!("Reached maximum of {} candidates", self.settings.max_candidates);
                return Some(HaltReason::CeilingReached);
            }
            if self.cancel.is_cancelled() {
                warn!("Run interrupted; saving results for page at offset {offset}");
                return Some(HaltReason::Cancelled);
            }

            match self.screen_candidate(profile, record, offset).await {
                CandidateOutcome::Processed(result) => {
                    summary.processed += 1;
                    results.push(result);
                }
                CandidateOutcome::Failed(result) => {
                    summary.failed += 1;
                    results.extend(result);
                }
                CandidateOutcome::Skipped => summary.skipped += 1,
                CandidateOutcome::Halt(reason) => {
                    warn!(
                        "Stopping mid-page at offset {offset} after {} result(s); saving partial results",
                        results.len()
                    );
                    return Some(reason);
                }
            }
        }
        None
    }

    async fn screen_candidate(
        &mut self,
        profile: &JobProfile,
        record: &CandidateRecord,
        offset: usize,
    ) -> CandidateOutcome {
        let job_id = profile.job_identifier.as_str();
        let candidate_id = record.candidate_identifier.as_str();

        if record.is_marked_processed() {
            debug!("Skipping {candidate_id}: tagged processed at source");
            return CandidateOutcome::Skipped;
        }
        match self.services.ledger.contains(job_id, candidate_id).await {
            Ok(true) => {
                debug!("Skipping {candidate_id}: already in ledger");
                return CandidateOutcome::Skipped;
            }
            Ok(false) => {}
            Err(e) => {
                error!(job_id, candidate_id, offset, "Ledger lookup failed: {e}");
                return CandidateOutcome::Failed(None);
            }
        }

        info!("Processing {candidate_id} ({})", record.display_name);
        let Some(text) = self.load_text(job_id, candidate_id, offset).await else {
            return CandidateOutcome::Failed(None);
        };

        if !self.quota.can_proceed() {
            error!("Request quota exhausted before scoring {candidate_id}");
            return CandidateOutcome::Halt(HaltReason::QuotaExhausted);
        }
        if !self.settings.pacing_delay.is_zero() {
            tokio::time::sleep(self.settings.pacing_delay).await;
        }

        let raw = match score_with_retry(
            self.services.oracle.as_ref(),
            profile,
            &text,
            &self.settings.retry,
            &mut self.quota,
        )
        .await
        {
            Ok(raw) => raw,
            Err(e) if e.halts_run() => {
                error!(job_id, candidate_id, offset, "Stopping run: {e}");
                return CandidateOutcome::Halt(HaltReason::QuotaExhausted);
            }
            Err(e) => {
                error!(job_id, candidate_id, offset, "Scoring failed: {e}");
                return CandidateOutcome::Failed(None);
            }
        };

        let result = parse_response(&raw).into_result(candidate_id, raw);
        info!(
            "Decision for {candidate_id}: {} ({}/100)",
            result.decision, result.total_score
        );
        self.persist(job_id, result, offset).await
    }

    async fn load_text(&self, job_id: &str, candidate_id: &str, offset: usize) -> Option<String> {
        let document = match self.services.source.fetch_resume(candidate_id).await {
            Ok(Some(document)) => document,
            Ok(None) => {
                error!(job_id, candidate_id, offset, "No resume found");
                return None;
            }
            Err(e) => {
                error!(job_id, candidate_id, offset, "Resume download failed: {e}");
                return None;
            }
        };

        debug!(
            "Downloaded resume for {} ({} bytes)",
            document.candidate_identifier,
            document.raw_bytes.len()
        );
        let text = self.services.extractor.extract(document.raw_bytes).await;
        if text.is_none() {
            error!(job_id, candidate_id, offset, "Could not extract resume text");
        }
        text
    }

    /// Sink first, then ledger, then the best-effort source tag.
    async fn persist(&self, job_id: &str, result: EvaluationResult, offset: usize) -> CandidateOutcome {
        let candidate_id = result.candidate_identifier.as_str();
        let now = self.services.clock.now();

        let record = SinkRecord::from_result(job_id, &result, now);
        if let Err(e) = self.services.sink.append(&record).await {
            error!(job_id, candidate_id, offset, "Failed to save result: {e}");
            return CandidateOutcome::Failed(Some(result));
        }

        let entry = LedgerEntry {
            job_identifier: job_id.to_string(),
            candidate_identifier: candidate_id.to_string(),
            recorded_at: now,
        };
        if let Err(e) = self.services.ledger.append(&entry).await {
            error!(
                job_id,
                candidate_id, offset, "Result saved but ledger write failed; candidate will be re-screened: {e}"
            );
            return CandidateOutcome::Failed(Some(result));
        }

        if !self.services.source.mark_processed(candidate_id).await {
            warn!("Could not tag {candidate_id} as processed at source");
        }
        CandidateOutcome::Processed(result)
    }

    fn drain(&mut self, results: &[EvaluationResult], offset: usize) {
        if let Err(e) = self.report.append_page(results) {
            error!(
                offset,
                "Failed to save page results to {}: {e}",
                self.report.path().display()
            );
        }
    }
}
