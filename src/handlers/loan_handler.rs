//! Loan Handlers
//!
//! Open a loan with its seed transaction, update its details, delete it.

use sqlx::PgPool;

use crate::domain::{BalanceChange, OperationContext};
use crate::error::AppError;
use crate::store::{LedgerStore, Loan};

use super::{
    normalize_text, normalize_title, require_user, CreateLoanCommand, CreateLoanResult,
    DeleteLoanCommand, UpdateLoanCommand,
};

/// Handler for opening a loan
pub struct CreateLoanHandler {
    store: LedgerStore,
}

impl CreateLoanHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            store: LedgerStore::new(pool),
        }
    }

    /// Create the loan and its seed transaction in one unit. The balance
    /// starts at zero and moves through the same increment as any other
    /// added transaction, ending at `+initialBalance` for LEND and
    /// `-initialBalance` for BORROW.
    pub async fn execute(
        &self,
        command: CreateLoanCommand,
        context: &OperationContext,
    ) -> Result<CreateLoanResult, AppError> {
        let user_id = require_user(context)?;
        let title = normalize_title(&command.title)?;
        let description = normalize_text(command.description.clone());
        let seed = command.seed_fields();

        let mut tx = self.store.begin().await?;

        if !self.store.user_exists(&mut tx, user_id).await? {
            return Err(AppError::UserNotFound(user_id.to_string()));
        }

        let loan = self
            .store
            .insert_loan(&mut tx, user_id, &title, description.as_deref())
            .await
            .map_err(|e| e.into_write_error(&title))?;

        let transaction = self.store.insert_transaction(&mut tx, loan.id, &seed).await?;
        let loan = self
            .store
            .apply_balance_change(&mut tx, loan.id, BalanceChange::add(transaction.entry()))
            .await?;

        tx.commit().await?;

        tracing::info!(
            loan_id = %loan.id,
            transaction_id = %transaction.id,
            loan_type = ?command.loan_type,
            balance = %loan.balance,
            correlation_id = ?context.correlation_id,
            "Loan created"
        );

        Ok(CreateLoanResult { loan, transaction })
    }
}

/// Handler for renaming, describing and opening/closing a loan
pub struct UpdateLoanHandler {
    store: LedgerStore,
}

impl UpdateLoanHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            store: LedgerStore::new(pool),
        }
    }

    /// Apply the supplied detail changes; the balance is left alone
    pub async fn execute(
        &self,
        command: UpdateLoanCommand,
        context: &OperationContext,
    ) -> Result<Loan, AppError> {
        let user_id = require_user(context)?;
        let new_title = command.title.as_deref().map(normalize_title).transpose()?;

        let mut tx = self.store.begin().await?;

        let loan = self
            .store
            .lock_loan(&mut tx, user_id, command.loan_title.trim())
            .await?
            .ok_or_else(|| AppError::LoanNotFound(command.loan_title.clone()))?;

        let title = new_title.unwrap_or_else(|| loan.title.clone());
        let description = match command.description {
            Some(description) => normalize_text(Some(description)),
            None => loan.description.clone(),
        };
        let status = command.status.unwrap_or(loan.status);

        let updated = self
            .store
            .update_loan_details(&mut tx, loan.id, &title, description.as_deref(), status)
            .await
            .map_err(|e| e.into_write_error(&title))?;

        tx.commit().await?;

        tracing::info!(
            loan_id = %updated.id,
            title = %updated.title,
            status = %updated.status,
            correlation_id = ?context.correlation_id,
            "Loan updated"
        );

        Ok(updated)
    }
}

/// Handler for deleting a loan with all its transactions
pub struct DeleteLoanHandler {
    store: LedgerStore,
}

impl DeleteLoanHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            store: LedgerStore::new(pool),
        }
    }

    pub async fn execute(
        &self,
        command: DeleteLoanCommand,
        context: &OperationContext,
    ) -> Result<(), AppError> {
        let user_id = require_user(context)?;

        let mut tx = self.store.begin().await?;

        let loan = self
            .store
            .lock_loan(&mut tx, user_id, command.loan_title.trim())
            .await?
            .ok_or_else(|| AppError::LoanNotFound(command.loan_title.clone()))?;

        let removed = self.store.delete_loan(&mut tx, loan.id).await?;

        tx.commit().await?;

        tracing::info!(
            loan_id = %loan.id,
            removed_transactions = removed,
            correlation_id = ?context.correlation_id,
            "Loan deleted"
        );

        Ok(())
    }
}
