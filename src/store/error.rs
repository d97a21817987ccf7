//! Store Errors

use std::fmt::Display;

use uuid::Uuid;

use crate::error::AppError;

/// Errors that can occur reading or writing the ledger tables
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row violates a domain rule the schema should have enforced
    #[error("Corrupt row {id} in {table}: {reason}")]
    CorruptRow {
        table: &'static str,
        id: Uuid,
        reason: String,
    },
}

impl StoreError {
    pub(crate) fn corrupt(table: &'static str, id: Uuid, reason: impl Display) -> Self {
        Self::CorruptRow {
            table,
            id,
            reason: reason.to_string(),
        }
    }

    /// Convert the failure of an insert or rename, recognising unique
    /// violations on the value the caller attempted to write.
    pub fn into_write_error(self, attempted: &str) -> AppError {
        match self {
            StoreError::Database(err) => AppError::from_write(err, attempted),
            other => other.into(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(err) => AppError::Database(err),
            corrupt @ StoreError::CorruptRow { .. } => AppError::Internal(corrupt.to_string()),
        }
    }
}
