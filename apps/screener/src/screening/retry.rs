//! Retry scheduling for scoring calls.
//!
//! `RetryPolicy::decide` is a pure state transition: (error, attempt) →
//! retry-after-delay or stop. `score_with_retry` drives it against a real
//! oracle, charging the quota for every attempt.

use std::time::Duration;

use thiserror::Error;
use tracing::{error, warn};

use crate::llm_client::{OracleError, ScoringOracle};
use crate::models::profile::JobProfile;
use crate::screening::quota::QuotaTracker;

/// How a scoring failure should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Daily quota gone; retrying inside the backoff window cannot help.
    QuotaExhausted,
    Transient,
    Permanent,
}

pub fn classify(err: &OracleError) -> FailureClass {
    match err {
        OracleError::RateLimited {
            quota_exhausted: true,
            ..
        } => FailureClass::QuotaExhausted,
        OracleError::RateLimited { .. } | OracleError::ServiceUnavailable(_) | OracleError::Timeout => {
            FailureClass::Transient
        }
        OracleError::Other(_) => FailureClass::Permanent,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    QuotaExhausted,
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(300),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// `min(base * 2^attempt, max)`, saturating.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Decides what follows a failed attempt (0-based).
    pub fn decide(&self, err: &OracleError, attempt: u32) -> RetryDecision {
        match classify(err) {
            FailureClass::QuotaExhausted => RetryDecision::QuotaExhausted,
            FailureClass::Permanent => RetryDecision::GiveUp,
            FailureClass::Transient if attempt + 1 >= self.max_attempts => RetryDecision::GiveUp,
            FailureClass::Transient => RetryDecision::RetryAfter(self.delay_for(attempt)),
        }
    }
}

#[derive(Debug, Error)]
pub enum ScoringError {
    /// The oracle reported its daily quota as used up.
    #[error("scoring quota exhausted: {0}")]
    QuotaExhausted(OracleError),

    /// The local tracker refused another attempt.
    #[error("local request quota reached")]
    QuotaDenied,

    #[error("scoring failed after {attempts} attempt(s): {last}")]
    Failed { attempts: u32, last: OracleError },
}

impl ScoringError {
    /// True when the run should stop rather than move to the next candidate.
    pub fn halts_run(&self) -> bool {
        matches!(self, ScoringError::QuotaExhausted(_) | ScoringError::QuotaDenied)
    }
}

/// Calls the oracle until it answers, the policy gives up, or quota runs out.
/// Every attempt counts against `quota`, including ones that fail.
pub async fn score_with_retry(
    oracle: &dyn ScoringOracle,
    profile: &JobProfile,
    candidate_text: &str,
    policy: &RetryPolicy,
    quota: &mut QuotaTracker,
) -> Result<String, ScoringError> {
    let mut attempt = 0u32;
    loop {
        if !quota.can_proceed() {
            return Err(ScoringError::QuotaDenied);
        }
        quota.record_use();

        let err = match oracle.score(profile, candidate_text).await {
            Ok(text) => return Ok(text),
            Err(e) => e,
        };

        match policy.decide(&err, attempt) {
            RetryDecision::RetryAfter(delay) => {
                warn!(
                    "Scoring attempt {}/{} failed ({err}), retrying in {}s",
                    attempt + 1,
                    policy.max_attempts,
                    delay.as_secs()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            RetryDecision::QuotaExhausted => {
                error!("Scoring quota exhausted for today: {err}");
                return Err(ScoringError::QuotaExhausted(err));
            }
            RetryDecision::GiveUp => {
                return Err(ScoringError::Failed {
                    attempts: attempt + 1,
                    last: err,
                });
            }
        }
    }
}
