use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::llm_client::DEFAULT_MODEL;
use crate::screening::pipeline::PipelineSettings;
use crate::screening::quota::QuotaConfig;
use crate::screening::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Lever,
    Local,
}

impl FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lever" => Ok(SourceKind::Lever),
            "local" => Ok(SourceKind::Local),
            other => bail!("Unknown candidate source '{other}' (expected 'lever' or 'local')"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Csv,
    Postgres,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(StorageBackend::Csv),
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            other => bail!("Unknown storage backend '{other}' (expected 'csv' or 'postgres')"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Credentials are only checked by the commands that need them, so listing
/// profiles works without scoring or ATS keys.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub source: SourceKind,
    pub lever_api_key: Option<String>,
    pub lever_stage_name: String,
    pub resume_dir: Option<PathBuf>,
    pub storage: StorageBackend,
    pub data_dir: PathBuf,
    pub database_url: Option<String>,
    pub results_dir: PathBuf,
    pub job_query: Option<String>,
    pub page_size: usize,
    pub max_candidates: usize,
    pub quota_max_requests: u32,
    pub quota_window: chrono::Duration,
    pub pacing_delay_secs: u64,
    pub retry_base_delay_secs: u64,
    pub retry_max_delay_secs: u64,
    pub retry_max_attempts: u32,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = Env(lookup);

        let storage: StorageBackend = env.parse_or("STORAGE_BACKEND", StorageBackend::Csv)?;
        let quota_window_hours: i64 = env.parse_or("QUOTA_WINDOW_HOURS", 24)?;

        let config = Config {
            gemini_api_key: env.optional("GEMINI_API_KEY"),
            gemini_model: env.or("GEMINI_MODEL", DEFAULT_MODEL),
            source: env.parse_or("CANDIDATE_SOURCE", SourceKind::Lever)?,
            lever_api_key: env.optional("LEVER_API_KEY"),
            lever_stage_name: env.or("LEVER_STAGE_NAME", "New Applicant"),
            resume_dir: env.optional("RESUME_DIR").map(PathBuf::from),
            storage,
            data_dir: env.or("DATA_DIR", "data").into(),
            database_url: match storage {
                StorageBackend::Postgres => Some(env.require("DATABASE_URL")?),
                StorageBackend::Csv => env.optional("DATABASE_URL"),
            },
            results_dir: env.or("RESULTS_DIR", ".").into(),
            job_query: env.optional("SCREENER_JOB_QUERY"),
            page_size: env.parse_or("PAGE_SIZE", 50)?,
            max_candidates: env.parse_or("MAX_CANDIDATES", 600)?,
            quota_max_requests: env.parse_or("QUOTA_MAX_REQUESTS", 1000)?,
            quota_window: chrono::Duration::try_hours(quota_window_hours)
                .filter(|w| *w > chrono::Duration::zero())
                .with_context(|| {
                    format!("QUOTA_WINDOW_HOURS must be a positive number of hours, got {quota_window_hours}")
                })?,
            pacing_delay_secs: env.parse_or("PACING_DELAY_SECS", 4)?,
            retry_base_delay_secs: env.parse_or("RETRY_BASE_DELAY_SECS", 60)?,
            retry_max_delay_secs: env.parse_or("RETRY_MAX_DELAY_SECS", 300)?,
            retry_max_attempts: env.parse_or("RETRY_MAX_ATTEMPTS", 5)?,
            rust_log: env.or("RUST_LOG", "info"),
        };

        if config.page_size == 0 {
            bail!("PAGE_SIZE must be at least 1");
        }
        if config.retry_max_attempts == 0 {
            bail!("RETRY_MAX_ATTEMPTS must be at least 1");
        }
        Ok(config)
    }

    pub fn gemini_api_key(&self) -> Result<&str> {
        self.gemini_api_key
            .as_deref()
            .context("Required environment variable 'GEMINI_API_KEY' is not set")
    }

    pub fn lever_api_key(&self) -> Result<&str> {
        self.lever_api_key
            .as_deref()
            .context("Required environment variable 'LEVER_API_KEY' is not set (CANDIDATE_SOURCE=lever)")
    }

    pub fn resume_dir(&self) -> Result<&Path> {
        self.resume_dir
            .as_deref()
            .context("Required environment variable 'RESUME_DIR' is not set (CANDIDATE_SOURCE=local)")
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            page_size: self.page_size,
            max_candidates: self.max_candidates,
            pacing_delay: Duration::from_secs(self.pacing_delay_secs),
            retry: RetryPolicy {
                base_delay: Duration::from_secs(self.retry_base_delay_secs),
                max_delay: Duration::from_secs(self.retry_max_delay_secs),
                max_attempts: self.retry_max_attempts,
            },
        }
    }

    pub fn quota_config(&self) -> QuotaConfig {
        QuotaConfig {
            max_requests: self.quota_max_requests,
            window: self.quota_window,
        }
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn require(&self, key: &str) -> Result<String> {
        self.optional(key)
            .with_context(|| format!("Required environment variable '{key}' is not set"))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => parse_value(key, &raw),
            None => Ok(default),
        }
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("{key} has an invalid value '{raw}'"))
}
