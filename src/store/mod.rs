//! Store module
//!
//! Postgres persistence for users, loans and transactions.

mod error;
pub mod models;
mod repository;

pub use error::StoreError;
pub use models::{
    Loan, LoanSummary, LoanWithTransactions, Transaction, TransactionFields, User,
};
pub use repository::{BalanceDrift, DbTransaction, LedgerStore, RECENT_LOANS_LIMIT};
