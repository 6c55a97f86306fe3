use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Screening outcome for one candidate.
///
/// `Error` means the scoring response carried no recognisable decision token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Shortlist,
    Reject,
    Error,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Shortlist => "SHORTLIST",
            Decision::Reject => "REJECT",
            Decision::Error => "ERROR",
        }
    }

    /// Parses a decision token case-insensitively. Anything unrecognised is `Error`.
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_uppercase().as_str() {
            "SHORTLIST" => Decision::Shortlist,
            "REJECT" => Decision::Reject,
            _ => Decision::Error,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Score categories
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreGroup {
    /// Technical skills & experience, 60 points.
    Technical,
    /// Impact & achievements, 40 points.
    Impact,
}

impl ScoreGroup {
    pub fn max_points(&self) -> u32 {
        match self {
            ScoreGroup::Technical => 60,
            ScoreGroup::Impact => 40,
        }
    }
}

/// The fixed set of labelled scores a scoring response may carry.
///
/// `Technical` and `Impact` are the group headline scores; the rest are the
/// sub-scores that roll up into them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreCategory {
    Technical,
    Skills,
    Experience,
    Tools,
    Domain,
    Impact,
    Quantifiable,
    ProblemSolving,
}

impl ScoreCategory {
    pub const ALL: [ScoreCategory; 8] = [
        ScoreCategory::Technical,
        ScoreCategory::Skills,
        ScoreCategory::Experience,
        ScoreCategory::Tools,
        ScoreCategory::Domain,
        ScoreCategory::Impact,
        ScoreCategory::Quantifiable,
        ScoreCategory::ProblemSolving,
    ];

    /// Line label as it appears in a scoring response.
    pub fn label(&self) -> &'static str {
        match self {
            ScoreCategory::Technical => "Technical Skills & Experience",
            ScoreCategory::Skills => "Technical Skills",
            ScoreCategory::Experience => "Experience Level",
            ScoreCategory::Tools => "Tools & Technologies",
            ScoreCategory::Domain => "Domain Knowledge",
            ScoreCategory::Impact => "Impact & Achievements",
            ScoreCategory::Quantifiable => "Quantifiable Impact",
            ScoreCategory::ProblemSolving => "Problem Solving",
        }
    }

    pub fn max_points(&self) -> u32 {
        match self {
            ScoreCategory::Technical => 60,
            ScoreCategory::Impact => 40,
            ScoreCategory::Skills
            | ScoreCategory::Experience
            | ScoreCategory::Tools
            | ScoreCategory::Domain => 15,
            ScoreCategory::Quantifiable | ScoreCategory::ProblemSolving => 20,
        }
    }

    pub fn group(&self) -> ScoreGroup {
        match self {
            ScoreCategory::Technical
            | ScoreCategory::Skills
            | ScoreCategory::Experience
            | ScoreCategory::Tools
            | ScoreCategory::Domain => ScoreGroup::Technical,
            ScoreCategory::Impact | ScoreCategory::Quantifiable | ScoreCategory::ProblemSolving => {
                ScoreGroup::Impact
            }
        }
    }

    pub fn is_headline(&self) -> bool {
        matches!(self, ScoreCategory::Technical | ScoreCategory::Impact)
    }
}

/// Points per category. Every category is always present; values never exceed
/// the category maximum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreBreakdown(BTreeMap<ScoreCategory, u32>);

impl Default for ScoreBreakdown {
    fn default() -> Self {
        Self(ScoreCategory::ALL.iter().map(|c| (*c, 0)).collect())
    }
}

impl ScoreBreakdown {
    pub fn get(&self, category: ScoreCategory) -> u32 {
        self.0.get(&category).copied().unwrap_or(0)
    }

    /// Stores `points`, clamped to the category maximum.
    pub fn set(&mut self, category: ScoreCategory, points: u32) {
        self.0.insert(category, points.min(category.max_points()));
    }

    /// Sum of the group's sub-scores, or the headline score when no sub-score
    /// was awarded.
    pub fn group_total(&self, group: ScoreGroup) -> u32 {
        let in_group = ScoreCategory::ALL.iter().copied().filter(|c| c.group() == group);

        let leaf_sum: u32 = in_group
            .clone()
            .filter(|c| !c.is_headline())
            .map(|c| self.get(c))
            .sum();
        let total = if leaf_sum > 0 {
            leaf_sum
        } else {
            in_group.filter(|c| c.is_headline()).map(|c| self.get(c)).sum()
        };
        total.min(group.max_points())
    }

    /// Overall score in 0..=100.
    pub fn total(&self) -> u32 {
        self.group_total(ScoreGroup::Technical) + self.group_total(ScoreGroup::Impact)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Results and persisted rows
// ────────────────────────────────────────────────────────────────────────────

/// Outcome of screening one candidate in one run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub candidate_identifier: String,
    pub decision: Decision,
    pub total_score: u32,
    pub breakdown: ScoreBreakdown,
    pub raw_explanation_text: String,
}

/// Idempotency marker: the pair was screened at `recorded_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub job_identifier: String,
    pub candidate_identifier: String,
    pub recorded_at: DateTime<Utc>,
}

/// A decision row as written to the result sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkRecord {
    pub job_identifier: String,
    pub candidate_identifier: String,
    pub decision: Decision,
    pub total_score: u32,
    pub breakdown: ScoreBreakdown,
    pub explanation: String,
    pub recorded_at: DateTime<Utc>,
}

impl SinkRecord {
    pub fn from_result(job_identifier: &str, result: &EvaluationResult, at: DateTime<Utc>) -> Self {
        Self {
            job_identifier: job_identifier.to_string(),
            candidate_identifier: result.candidate_identifier.clone(),
            decision: result.decision,
            total_score: result.total_score,
            breakdown: result.breakdown.clone(),
            explanation: result.raw_explanation_text.clone(),
            recorded_at: at,
        }
    }
}
