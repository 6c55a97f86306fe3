use thiserror::Error;

use crate::storage::StorageError;

/// Run-level errors. Per-candidate failures never surface here; they are
/// counted and logged by the pipeline.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("No job profile matches '{query}' ({available} profiles available)")]
    NoMatchingProfile { query: String, available: usize },

    #[error("Could not load job profiles: {0}")]
    Profiles(#[from] StorageError),
}

impl AppError {
    /// Configuration problems abort the run before any candidate is touched.
    pub fn is_configuration(&self) -> bool {
        match self {
            AppError::NoMatchingProfile { .. } => true,
            AppError::Profiles(StorageError::MissingSchema(_)) => true,
            AppError::Profiles(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_profile_table_is_configuration() {
        let err = AppError::from(StorageError::MissingSchema("job_profiles".to_string()));
        assert!(err.is_configuration());
        assert_eq!(
            err.to_string(),
            "Could not load job profiles: storage target 'job_profiles' does not exist"
        );
    }

    #[test]
    fn test_no_match_message_names_query() {
        let err = AppError::NoMatchingProfile {
            query: "pastry chef".to_string(),
            available: 3,
        };
        assert!(err.is_configuration());
        assert!(err.to_string().contains("pastry chef"));
    }
}
