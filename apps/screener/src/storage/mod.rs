//! Persistence for job profiles, the idempotency ledger and screening results.
//!
//! Ledger and sink writes are append-only. Each backend provisions its own
//! schema on first write: when a write reports `MissingSchema`, the backend
//! creates the table (or file plus header row) and retries exactly once.

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::models::evaluation::{LedgerEntry, SinkRecord};
use crate::models::profile::JobProfile;

pub mod csv_store;
pub mod pg;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage target '{0}' does not exist")]
    MissingSchema(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn list_profiles(&self) -> Result<Vec<JobProfile>, StorageError>;
}

#[async_trait]
pub trait IdempotencyLedger: Send + Sync {
    async fn contains(&self, job_id: &str, candidate_id: &str) -> Result<bool, StorageError>;
    async fn append(&self, entry: &LedgerEntry) -> Result<(), StorageError>;
}

#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn append(&self, record: &SinkRecord) -> Result<(), StorageError>;
}

/// Low-level write plus schema creation, shared by ledger and sink backends.
#[async_trait]
pub(crate) trait ProvisionedTable<Row: Sync + 'static>: Send + Sync {
    async fn insert_row(&self, row: &Row) -> Result<(), StorageError>;

    async fn provision(&self) -> Result<(), StorageError>;

    async fn insert_provisioned(&self, row: &Row) -> Result<(), StorageError> {
        match self.insert_row(row).await {
            Err(StorageError::MissingSchema(target)) => {
                warn!("Storage target '{target}' missing, provisioning and retrying once");
                self.provision().await?;
                self.insert_row(row).await
            }
            other => other,
        }
    }
}
