//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;

use super::AmountError;

/// Validation failures and broken ledger rules.
///
/// These are independent of the web/infrastructure layer; the application
/// layer reports all of them as invalid input.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Invalid amount (zero, negative, sub-cent or exceeds limit)
    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),

    /// Loan title is empty or too long
    #[error("Invalid loan title: {0}")]
    InvalidTitle(String),

    /// User name or email fails validation
    #[error("Invalid user: {0}")]
    InvalidUser(String),

    /// Currency is not a three-letter code
    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),

    /// Text that does not name a known enum variant
    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    /// A transaction id that the in-memory ledger does not hold
    #[error("Transaction not found in ledger: {0}")]
    UnknownTransaction(uuid::Uuid),

    /// A transaction id that the in-memory ledger already holds
    #[error("Transaction already recorded in ledger: {0}")]
    DuplicateTransaction(uuid::Uuid),
}
