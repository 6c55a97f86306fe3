//! Response parser: decodes a scoring oracle's free-text evaluation.
//!
//! Tolerant by construction: every field is optional and a missing label
//! defaults to zero points. The decision token and the score are independent
//! signals; they are never cross-checked here.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::evaluation::{Decision, EvaluationResult, ScoreBreakdown, ScoreCategory};

/// Prefix match on the token, so "SHORTLISTED" and "REJECTED" still count.
static DECISION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)DECISION\s*\**\s*:\s*\**\s*(SHORTLIST|REJECT)").unwrap());

/// One pattern per category: `<label>: <points>/<max>`, ignoring case, stray
/// markdown emphasis and spacing around the slash.
static SCORE_PATTERNS: Lazy<Vec<(ScoreCategory, Regex)>> = Lazy::new(|| {
    ScoreCategory::ALL
        .iter()
        .map(|category| {
            let pattern = format!(
                r"(?i){}\s*\**\s*:\s*\**\s*\[?(\d{{1,9}})\]?\s*/\s*{}\b",
                regex::escape(category.label()),
                category.max_points()
            );
            (*category, Regex::new(&pattern).unwrap())
        })
        .collect()
});

/// Structured fields decoded from a response. Becomes an `EvaluationResult`
/// once the candidate and raw text are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEvaluation {
    pub decision: Decision,
    pub total_score: u32,
    pub breakdown: ScoreBreakdown,
}

impl ParsedEvaluation {
    pub fn into_result(self, candidate_identifier: &str, raw_text: String) -> EvaluationResult {
        EvaluationResult {
            candidate_identifier: candidate_identifier.to_string(),
            decision: self.decision,
            total_score: self.total_score,
            breakdown: self.breakdown,
            raw_explanation_text: raw_text,
        }
    }
}

/// Parses a raw scoring response. Pure and deterministic.
pub fn parse_response(raw_text: &str) -> ParsedEvaluation {
    let decision = DECISION_RE
        .captures(raw_text)
        .and_then(|c| c.get(1))
        .map(|m| Decision::from_token(m.as_str()))
        .unwrap_or(Decision::Error);

    let mut breakdown = ScoreBreakdown::default();
    for (category, re) in SCORE_PATTERNS.iter() {
        let points = re
            .captures(raw_text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(0);
        breakdown.set(*category, points);
    }

    ParsedEvaluation {
        decision,
        total_score: breakdown.total(),
        breakdown,
    }
}
