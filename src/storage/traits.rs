//! Storage sink trait and error types
//!
//! The crawl hands each standardized record to a [`ProductSink`] as soon as
//! it is produced. Sinks must tolerate concurrent calls; no ordering between
//! records is implied.

use crate::output::RunSummary;
use crate::product::StandardProductRecord;
use async_trait::async_trait;
use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Constraint violation for {retailer}/{product_id}: {details}")]
    ConstraintViolation {
        retailer: String,
        product_id: String,
        details: String,
    },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Short machine-readable classification, logged with every failure
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(failure, _)) => match failure.code {
                ErrorCode::ConstraintViolation => "constraint_violation",
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => "database_busy",
                ErrorCode::CannotOpen => "cannot_open",
                ErrorCode::ReadOnly => "read_only",
                ErrorCode::DiskFull => "disk_full",
                _ => "sqlite_failure",
            },
            Self::Sqlite(_) => "sqlite",
            Self::Serialization(_) => "serialization",
            Self::ConstraintViolation { .. } => "constraint_violation",
            Self::Unavailable(_) => "unavailable",
            Self::Io(_) => "io",
        }
    }

    /// Underlying detail message
    pub fn details(&self) -> String {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(failure, Some(message))) => {
                format!("{} (extended code {})", message, failure.extended_code)
            }
            Self::ConstraintViolation { details, .. } => details.clone(),
            other => other.to_string(),
        }
    }

    /// Suggested remedy, when one is known
    pub fn hint(&self) -> Option<&'static str> {
        match self.code() {
            "constraint_violation" => {
                Some("the record conflicts with an existing row; check the (retailer, product_id) key")
            }
            "database_busy" => Some("another process holds the database lock; retry the run later"),
            "cannot_open" | "read_only" => {
                Some("check that output.database-path points to a writable location")
            }
            "disk_full" => Some("free disk space before the next run"),
            "serialization" => Some("the record contains values that cannot be encoded as JSON"),
            _ => None,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Destination for standardized product records
#[async_trait]
pub trait ProductSink: Send + Sync {
    /// Persists one record, replacing any earlier version with the same
    /// `(retailer, product_id)`
    async fn store(&self, record: &StandardProductRecord) -> StorageResult<()>;

    /// Records a finished run; sinks without run history ignore it
    async fn record_run(&self, _summary: &RunSummary) -> StorageResult<()> {
        Ok(())
    }
}
