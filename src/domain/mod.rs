//! Domain module
//!
//! Core domain types and ledger arithmetic.

pub mod amount;
pub mod context;
pub mod error;
pub mod ledger;
pub mod types;

pub use amount::{Amount, AmountError, Balance};
pub use context::OperationContext;
pub use error::DomainError;
pub use ledger::{signed_delta, BalanceChange, LedgerEntry, LoanLedger};
pub use types::{CurrencyCode, LoanStatus, LoanType, TransactionMethod, TransactionType};
