//! Storage error model.

use shopledger_core::DomainError;
use thiserror::Error;

/// Result type used across the store crate.
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage-level error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying SQLite read or write failed. Never retried.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// A schema migration step failed; the migration was rolled back.
    #[error("migration {version} ({name}) failed at step {step}: {source}")]
    Migration {
        version: i64,
        name: &'static str,
        step: String,
        #[source]
        source: sqlx::Error,
    },

    /// A delete was refused because other rows still reference the record.
    #[error("{entity} {id} is in use by {references} {referenced_by} row(s)")]
    InUse {
        entity: &'static str,
        id: i64,
        referenced_by: &'static str,
        references: i64,
    },

    /// The addressed row does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// A value was rejected before reaching storage.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<i64>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn is_in_use(&self) -> bool {
        matches!(self, Self::InUse { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
