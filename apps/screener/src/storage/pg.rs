//! PostgreSQL backend. Tables are created on the first write that finds them missing.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;

use crate::models::evaluation::{LedgerEntry, SinkRecord};
use crate::models::profile::JobProfile;
use crate::storage::{
    IdempotencyLedger, ProfileStore, ProvisionedTable, ResultSink, StorageError,
};

const LEDGER_TABLE: &str = "screening_ledger";
const RESULTS_TABLE: &str = "screening_results";
const PROFILES_TABLE: &str = "job_profiles";

/// Postgres `undefined_table`.
const UNDEFINED_TABLE: &str = "42P01";

/// Maps an undefined-table error to `MissingSchema`, everything else to `Database`.
fn map_err(table: &str, err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(UNDEFINED_TABLE) {
            return StorageError::MissingSchema(table.to_string());
        }
    }
    StorageError::Database(err)
}

#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProvisionedTable<LedgerEntry> for PgLedger {
    async fn insert_row(&self, entry: &LedgerEntry) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO screening_ledger (job_id, candidate_id, processed_at) VALUES ($1, $2, $3)",
        )
        .bind(&entry.job_identifier)
        .bind(&entry.candidate_identifier)
        .bind(entry.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_err(LEDGER_TABLE, e))?;
        Ok(())
    }

    async fn provision(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS screening_ledger (
                job_id        TEXT        NOT NULL,
                candidate_id  TEXT        NOT NULL,
                processed_at  TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS screening_ledger_pair_idx \
             ON screening_ledger (job_id, candidate_id)",
        )
        .execute(&self.pool)
        .await?;
        info!("Provisioned table {LEDGER_TABLE}");
        Ok(())
    }
}

#[async_trait]
impl IdempotencyLedger for PgLedger {
    async fn contains(&self, job_id: &str, candidate_id: &str) -> Result<bool, StorageError> {
        let found = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM screening_ledger WHERE job_id = $1 AND candidate_id = $2)",
        )
        .bind(job_id)
        .bind(candidate_id)
        .fetch_one(&self.pool)
        .await;

        match found.map_err(|e| map_err(LEDGER_TABLE, e)) {
            Ok(found) => Ok(found),
            // Nothing can have been processed before the ledger exists.
            Err(StorageError::MissingSchema(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn append(&self, entry: &LedgerEntry) -> Result<(), StorageError> {
        self.insert_provisioned(entry).await
    }
}

#[derive(Clone)]
pub struct PgResultSink {
    pool: PgPool,
}

impl PgResultSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProvisionedTable<SinkRecord> for PgResultSink {
    async fn insert_row(&self, record: &SinkRecord) -> Result<(), StorageError> {
        let scores = serde_json::to_value(&record.breakdown)?;
        sqlx::query(
            r#"
            INSERT INTO screening_results
                (job_id, candidate_id, decision, total_score, scores, explanation, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&record.job_identifier)
        .bind(&record.candidate_identifier)
        .bind(record.decision.as_str())
        .bind(record.total_score as i32)
        .bind(scores)
        .bind(&record.explanation)
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_err(RESULTS_TABLE, e))?;
        Ok(())
    }

    async fn provision(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS screening_results (
                id            BIGSERIAL   PRIMARY KEY,
                job_id        TEXT        NOT NULL,
                candidate_id  TEXT        NOT NULL,
                decision      TEXT        NOT NULL,
                total_score   INTEGER     NOT NULL,
                scores        JSONB       NOT NULL,
                explanation   TEXT        NOT NULL,
                recorded_at   TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        info!("Provisioned table {RESULTS_TABLE}");
        Ok(())
    }
}

#[async_trait]
impl ResultSink for PgResultSink {
    async fn append(&self, record: &SinkRecord) -> Result<(), StorageError> {
        self.insert_provisioned(record).await
    }
}

#[derive(Clone)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn list_profiles(&self) -> Result<Vec<JobProfile>, StorageError> {
        sqlx::query_as::<_, JobProfile>(
            "SELECT job_posting, job_description, recruiter_prompt FROM job_profiles ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_err(PROFILES_TABLE, e))
    }
}
