//! Query Handler
//!
//! Read-only access to a user's loans, transactions and profile. Every
//! query is scoped to the requesting user; a loan owned by someone else
//! is reported as not found.

use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{LoanStatus, OperationContext};
use crate::error::AppError;
use crate::store::{LedgerStore, LoanSummary, LoanWithTransactions, Transaction, User};

use super::require_user;

#[derive(Debug, Clone)]
pub struct LoanQueryHandler {
    store: LedgerStore,
}

impl LoanQueryHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            store: LedgerStore::new(pool),
        }
    }

    /// Loans ordered by last update, optionally filtered by status
    pub async fn list_loans(
        &self,
        status: Option<LoanStatus>,
        context: &OperationContext,
    ) -> Result<Vec<LoanSummary>, AppError> {
        let user_id = require_user(context)?;
        Ok(self.store.list_loans(user_id, status, None).await?)
    }

    /// The most recently updated loans
    pub async fn recent_loans(
        &self,
        context: &OperationContext,
    ) -> Result<Vec<LoanSummary>, AppError> {
        let user_id = require_user(context)?;
        Ok(self.store.recent_loans(user_id).await?)
    }

    pub async fn get_loan(
        &self,
        title: &str,
        context: &OperationContext,
    ) -> Result<LoanWithTransactions, AppError> {
        let user_id = require_user(context)?;
        self.store
            .get_loan(user_id, title.trim())
            .await?
            .ok_or_else(|| AppError::LoanNotFound(title.to_string()))
    }

    pub async fn get_transaction(
        &self,
        title: &str,
        transaction_id: Uuid,
        context: &OperationContext,
    ) -> Result<Transaction, AppError> {
        let user_id = require_user(context)?;
        let loan = self
            .store
            .find_loan(user_id, title.trim())
            .await?
            .ok_or_else(|| AppError::LoanNotFound(title.to_string()))?;

        self.store
            .find_transaction(loan.id, transaction_id)
            .await?
            .ok_or_else(|| AppError::TransactionNotFound(transaction_id.to_string()))
    }

    pub async fn get_profile(&self, context: &OperationContext) -> Result<User, AppError> {
        let user_id = require_user(context)?;
        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))
    }
}
