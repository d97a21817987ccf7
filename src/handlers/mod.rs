//! Command Handlers module
//!
//! Each handler runs one ledger operation as a single database
//! transaction: lock the loan row, write the transaction table, move the
//! balance, commit. Any error drops the transaction and rolls it back.

mod commands;
mod loan_handler;
mod query_handler;
mod transaction_handler;
mod user_handler;

use uuid::Uuid;

use crate::domain::OperationContext;
use crate::error::AppError;

pub use commands::*;
pub use loan_handler::{CreateLoanHandler, DeleteLoanHandler, UpdateLoanHandler};
pub use query_handler::LoanQueryHandler;
pub use transaction_handler::{
    AddTransactionHandler, DeleteTransactionHandler, EditTransactionHandler,
};
pub use user_handler::{CreateUserHandler, UpdateProfileHandler};

/// Header carrying the user that owns the loans being touched
pub const REQUEST_USER_HEADER: &str = "X-Request-User-Id";

/// The ownership scope of an operation
pub(crate) fn require_user(context: &OperationContext) -> Result<Uuid, AppError> {
    context
        .request_user_id
        .ok_or_else(|| AppError::MissingHeader(REQUEST_USER_HEADER.to_string()))
}
