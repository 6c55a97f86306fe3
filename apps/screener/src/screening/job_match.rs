//! Resolves a free-form job query to a stored `JobProfile`.
//!
//! Matching is an ordered list of strategies over normalized text. The first
//! strategy that matches any profile wins; within a strategy, profile order wins.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::profile::JobProfile;

/// Leading labels recruiters paste in front of titles, including the common typo.
const TITLE_PREFIXES: &[&str] = &[
    "job title -",
    "job tittle -",
    "job title-",
    "job tittle-",
    "job title:",
    "job tittle:",
];

static SPACED_HYPHEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*-\s*").unwrap());

/// Lowercases, strips a title prefix, unifies dashes, drops punctuation other
/// than hyphens and collapses the whitespace left behind.
pub fn normalize(text: &str) -> String {
    let mut text = text.trim().to_lowercase();
    if let Some(prefix) = TITLE_PREFIXES.iter().find(|p| text.starts_with(*p)) {
        text = text[prefix.len()..].to_string();
    }

    let unified: String = text
        .chars()
        .map(|c| if matches!(c, '–' | '—') { '-' } else { c })
        .collect();
    let kept: String = unified
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-')
        .collect();
    let collapsed = kept.split_whitespace().collect::<Vec<_>>().join(" ");

    SPACED_HYPHEN_RE.replace_all(&collapsed, "-").to_string()
}

fn without(text: &str, dropped: &[char]) -> String {
    text.chars().filter(|c| !dropped.contains(c)).collect()
}

type Matcher = fn(&str, &JobProfile) -> bool;

fn identifier_exact(query: &str, profile: &JobProfile) -> bool {
    query == normalize(&profile.job_identifier)
}

fn identifier_contains(query: &str, profile: &JobProfile) -> bool {
    normalize(&profile.job_identifier).contains(query)
}

fn identifier_ignoring_separators(query: &str, profile: &JobProfile) -> bool {
    without(query, &[' ', '-']) == without(&normalize(&profile.job_identifier), &[' ', '-'])
}

fn description_matches(query: &str, profile: &JobProfile) -> bool {
    let description = normalize(&profile.description_text);
    query == description
        || without(query, &['-']) == without(&description, &['-'])
        || description.contains(query)
        || without(&description, &[' ', '-']).contains(&without(query, &[' ', '-']))
}

const STRATEGIES: &[(&str, Matcher)] = &[
    ("identifier exact", identifier_exact),
    ("identifier substring", identifier_contains),
    ("identifier ignoring separators", identifier_ignoring_separators),
    ("description", description_matches),
];

/// Returns the matching profile and the name of the strategy that matched.
/// A query that normalizes to nothing matches nothing.
pub fn resolve_profile<'a>(
    profiles: &'a [JobProfile],
    query: &str,
) -> Option<(&'a JobProfile, &'static str)> {
    let query = normalize(query);
    if query.is_empty() {
        return None;
    }

    STRATEGIES.iter().find_map(|(name, matches)| {
        profiles
            .iter()
            .find(|p| matches(&query, p))
            .map(|p| (p, *name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(identifier: &str, description: &str) -> JobProfile {
        JobProfile {
            job_identifier: identifier.to_string(),
            description_text: description.to_string(),
            evaluator_instructions: String::new(),
        }
    }

    #[test]
    fn test_normalize_strips_prefix_and_punctuation() {
        assert_eq!(normalize("Job Title: Senior  Engineer (Rust)!"), "senior engineer rust");
        assert_eq!(normalize("JOB TITTLE - Data Analyst"), "data analyst");
    }

    #[test]
    fn test_normalize_unifies_dashes() {
        assert_eq!(normalize("Backend – Payments"), "backend-payments");
        assert_eq!(normalize("Backend—Payments"), "backend-payments");
        assert_eq!(normalize("Backend  -  Payments"), "backend-payments");
    }

    #[test]
    fn test_normalize_collapses_space_left_by_dropped_punctuation() {
        assert_eq!(normalize("Backend & Payments"), "backend payments");
        assert_eq!(normalize("Ops / SRE - Tier 2"), "ops sre-tier 2");
    }

    #[test]
    fn test_ampersand_title_matches_identifier_exactly() {
        let profiles = vec![profile("backend payments", "Payments platform")];
        let (_, strategy) = resolve_profile(&profiles, "Backend & Payments").unwrap();
        assert_eq!(strategy, "identifier exact");
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_hyphenated_query_matches_spaced_identifier() {
        let profiles = vec![
            profile("frontend", "React developer"),
            profile("senior backend", "Backend engineer"),
        ];
        let (found, strategy) = resolve_profile(&profiles, "Senior-Backend").unwrap();
        assert_eq!(found.job_identifier, "senior backend");
        assert_eq!(strategy, "identifier ignoring separators");
    }

    #[test]
    fn test_exact_beats_substring_of_earlier_profile() {
        let profiles = vec![profile("data engineer ii", "x"), profile("data engineer", "y")];
        let (found, strategy) = resolve_profile(&profiles, "Data Engineer").unwrap();
        assert_eq!(found.job_identifier, "data engineer");
        assert_eq!(strategy, "identifier exact");
    }

    #[test]
    fn test_identifier_substring() {
        let profiles = vec![profile("Job Title: Staff Platform Engineer", "x")];
        let (_, strategy) = resolve_profile(&profiles, "platform").unwrap();
        assert_eq!(strategy, "identifier substring");
    }

    #[test]
    fn test_falls_back_to_description() {
        let profiles = vec![profile(
            "225695e6-a447",
            "We are hiring a Machine-Learning Engineer to own ranking.",
        )];
        let (_, strategy) = resolve_profile(&profiles, "machine learning engineer").unwrap();
        assert_eq!(strategy, "description");
    }

    #[test]
    fn test_no_match_is_none() {
        let profiles = vec![profile("backend", "Rust services")];
        assert!(resolve_profile(&profiles, "nurse practitioner").is_none());
    }

    #[test]
    fn test_empty_query_matches_nothing() {
        let profiles = vec![profile("backend", "Rust services")];
        assert!(resolve_profile(&profiles, "Job Title:").is_none());
    }
}
