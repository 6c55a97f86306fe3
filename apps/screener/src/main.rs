mod config;
mod db;
mod errors;
mod extract;
mod llm_client;
mod models;
mod screening;
mod sources;
mod state;
mod storage;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, SourceKind, StorageBackend};
use crate::db::create_pool;
use crate::extract::PdfTextExtractor;
use crate::llm_client::GeminiClient;
use crate::screening::pipeline::{BatchPipeline, CancelFlag};
use crate::screening::quota::{Clock, QuotaTracker, SystemClock};
use crate::screening::report::RunReport;
use crate::sources::lever::LeverClient;
use crate::sources::local::DirectorySource;
use crate::sources::CandidateSource;
use crate::state::ScreeningServices;
use crate::storage::csv_store::{
    CsvLedger, CsvProfileStore, CsvResultSink, LEDGER_FILE, PROFILES_FILE, RESULTS_FILE,
};
use crate::storage::pg::{PgLedger, PgProfileStore, PgResultSink};
use crate::storage::{IdempotencyLedger, ProfileStore, ResultSink};

#[derive(Debug, Parser)]
#[command(name = "screener", version, about = "Batch resume screening against job profiles")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Screen candidates for one job profile
    Run {
        /// Job title or description fragment; falls back to SCREENER_JOB_QUERY
        #[arg(long)]
        job: Option<String>,
        #[arg(long)]
        page_size: Option<usize>,
        #[arg(long)]
        max_candidates: Option<usize>,
    },
    /// List the job profiles available for screening
    Profiles,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting screener v{}", env!("CARGO_PKG_VERSION"));

    let stores = build_stores(&config).await?;

    match cli.command {
        Command::Profiles => list_profiles(stores.profiles.as_ref()).await,
        Command::Run {
            job,
            page_size,
            max_candidates,
        } => {
            let services = build_services(&config, stores)?;
            let query = job
                .or_else(|| config.job_query.clone())
                .context("No job given: pass --job or set SCREENER_JOB_QUERY")?;

            let mut settings = config.pipeline_settings();
            if let Some(n) = page_size {
                settings.page_size = n.max(1);
            }
            if let Some(n) = max_candidates {
                settings.max_candidates = n;
            }

            std::fs::create_dir_all(&config.results_dir).with_context(|| {
                format!("Cannot create results directory {}", config.results_dir.display())
            })?;
            let report = RunReport::for_run(&config.results_dir, Utc::now());
            let quota = QuotaTracker::new(config.quota_config(), services.clock.clone());

            let cancel = CancelFlag::default();
            spawn_interrupt_watcher(cancel.clone());

            let mut pipeline = BatchPipeline::new(services, settings, quota, report, cancel);
            let summary = match pipeline.run(&query).await {
                Ok(summary) => summary,
                Err(e) if e.is_configuration() => {
                    error!("Cannot start screening: {e}");
                    error!("Run `screener profiles` to see the configured job profiles");
                    std::process::exit(2);
                }
                Err(e) => return Err(e.into()),
            };

            info!(
                "Screening complete for '{}': {} processed, {} failed, {} skipped across {} page(s) ({:?})",
                summary.job_identifier,
                summary.processed,
                summary.failed,
                summary.skipped,
                summary.pages,
                summary.halt
            );
            info!(
                "Run report: {} ({} row(s))",
                pipeline.report().path().display(),
                pipeline.report().rows_written()
            );
            info!(
                "{} scoring request(s) left in the current quota window",
                pipeline.quota().remaining()
            );
            Ok(())
        }
    }
}

/// Profile store, ledger and sink for the configured backend.
struct Stores {
    profiles: Arc<dyn ProfileStore>,
    ledger: Arc<dyn IdempotencyLedger>,
    sink: Arc<dyn ResultSink>,
}

async fn build_stores(config: &Config) -> Result<Stores> {
    match config.storage {
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres backend")?;
            let pool = create_pool(url).await?;
            Ok(Stores {
                profiles: Arc::new(PgProfileStore::new(pool.clone())),
                ledger: Arc::new(PgLedger::new(pool.clone())),
                sink: Arc::new(PgResultSink::new(pool)),
            })
        }
        StorageBackend::Csv => {
            std::fs::create_dir_all(&config.data_dir).with_context(|| {
                format!("Cannot create data directory {}", config.data_dir.display())
            })?;
            info!("Using CSV storage under {}", config.data_dir.display());
            Ok(Stores {
                profiles: Arc::new(CsvProfileStore::new(config.data_dir.join(PROFILES_FILE))),
                ledger: Arc::new(CsvLedger::new(config.data_dir.join(LEDGER_FILE))),
                sink: Arc::new(CsvResultSink::new(config.data_dir.join(RESULTS_FILE))),
            })
        }
    }
}

/// Adds the candidate source and scoring oracle; only `run` needs their credentials.
fn build_services(config: &Config, stores: Stores) -> Result<ScreeningServices> {
    let source: Arc<dyn CandidateSource> = match config.source {
        SourceKind::Lever => {
            let api_key = config.lever_api_key()?.to_string();
            info!("Using Lever stage '{}'", config.lever_stage_name);
            Arc::new(LeverClient::new(api_key, config.lever_stage_name.clone()))
        }
        SourceKind::Local => {
            let dir = config.resume_dir()?;
            info!("Reading resumes from {}", dir.display());
            Arc::new(DirectorySource::new(dir))
        }
    };

    let oracle = GeminiClient::new(
        config.gemini_api_key()?.to_string(),
        config.gemini_model.clone(),
    )
    .context("Failed to build Gemini HTTP client")?;
    info!("Scoring with model {}", oracle.model());

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    Ok(ScreeningServices {
        profiles: stores.profiles,
        source,
        extractor: Arc::new(PdfTextExtractor),
        oracle: Arc::new(oracle),
        ledger: stores.ledger,
        sink: stores.sink,
        clock,
    })
}

async fn list_profiles(store: &dyn ProfileStore) -> Result<()> {
    let profiles = store.list_profiles().await?;
    if profiles.is_empty() {
        warn!("No job profiles configured");
    }
    for (idx, profile) in profiles.iter().enumerate() {
        info!("{}. [{}] {}", idx + 1, profile.job_identifier, profile.preview(120));
    }
    Ok(())
}

/// First Ctrl-C stops the run after the current candidate.
fn spawn_interrupt_watcher(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing current candidate and saving results");
            cancel.cancel();
        }
    });
}
