//! Transaction Handlers
//!
//! Add, edit and delete transactions, keeping the parent loan's balance
//! equal to the signed sum of its transactions.

use sqlx::PgPool;

use crate::domain::{BalanceChange, OperationContext};
use crate::error::AppError;
use crate::store::{LedgerStore, Loan};

use super::{
    require_user, AddTransactionCommand, DeleteTransactionCommand, DeleteTransactionResult,
    EditTransactionCommand, TransactionResult,
};

/// Handler for recording a new transaction
pub struct AddTransactionHandler {
    store: LedgerStore,
}

impl AddTransactionHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            store: LedgerStore::new(pool),
        }
    }

    /// Insert the transaction and increment the balance by its signed delta
    pub async fn execute(
        &self,
        command: AddTransactionCommand,
        context: &OperationContext,
    ) -> Result<TransactionResult, AppError> {
        let user_id = require_user(context)?;
        let fields = command.fields();

        let mut tx = self.store.begin().await?;

        let loan = self
            .store
            .lock_loan(&mut tx, user_id, command.loan_title.trim())
            .await?
            .ok_or_else(|| AppError::LoanNotFound(command.loan_title.clone()))?;

        let transaction = self.store.insert_transaction(&mut tx, loan.id, &fields).await?;
        let change = BalanceChange::add(transaction.entry());
        let loan = self.store.apply_balance_change(&mut tx, loan.id, change).await?;

        tx.commit().await?;

        tracing::info!(
            loan_id = %loan.id,
            transaction_id = %transaction.id,
            delta = %change.increment(),
            balance = %loan.balance,
            correlation_id = ?context.correlation_id,
            client_ip = ?context.client_ip,
            "Transaction added"
        );

        Ok(TransactionResult { transaction, loan })
    }
}

/// Handler for replacing the fields of a transaction
pub struct EditTransactionHandler {
    store: LedgerStore,
}

impl EditTransactionHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            store: LedgerStore::new(pool),
        }
    }

    /// Rewrite the transaction and move the balance by `new - old`
    pub async fn execute(
        &self,
        command: EditTransactionCommand,
        context: &OperationContext,
    ) -> Result<TransactionResult, AppError> {
        let user_id = require_user(context)?;
        let fields = command.fields();

        let mut tx = self.store.begin().await?;

        let loan = self
            .store
            .lock_loan(&mut tx, user_id, command.loan_title.trim())
            .await?
            .ok_or_else(|| AppError::LoanNotFound(command.loan_title.clone()))?;

        let existing = self
            .store
            .lock_transaction(&mut tx, loan.id, command.transaction_id)
            .await?
            .ok_or_else(|| AppError::TransactionNotFound(command.transaction_id.to_string()))?;

        let transaction = self
            .store
            .update_transaction(&mut tx, existing.id, &fields)
            .await?;
        let change = BalanceChange::edit(existing.entry(), transaction.entry());
        let loan = self.store.apply_balance_change(&mut tx, loan.id, change).await?;

        tx.commit().await?;

        tracing::info!(
            loan_id = %loan.id,
            transaction_id = %transaction.id,
            delta = %change.increment(),
            balance = %loan.balance,
            correlation_id = ?context.correlation_id,
            client_ip = ?context.client_ip,
            "Transaction edited"
        );

        Ok(TransactionResult { transaction, loan })
    }
}

/// Handler for removing a transaction
pub struct DeleteTransactionHandler {
    store: LedgerStore,
}

impl DeleteTransactionHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            store: LedgerStore::new(pool),
        }
    }

    /// Delete the transaction and reverse its signed delta
    pub async fn execute(
        &self,
        command: DeleteTransactionCommand,
        context: &OperationContext,
    ) -> Result<DeleteTransactionResult, AppError> {
        let user_id = require_user(context)?;

        let mut tx = self.store.begin().await?;

        let loan: Loan = self
            .store
            .lock_loan(&mut tx, user_id, command.loan_title.trim())
            .await?
            .ok_or_else(|| AppError::LoanNotFound(command.loan_title.clone()))?;

        let existing = self
            .store
            .lock_transaction(&mut tx, loan.id, command.transaction_id)
            .await?
            .ok_or_else(|| AppError::TransactionNotFound(command.transaction_id.to_string()))?;

        self.store.delete_transaction(&mut tx, existing.id).await?;
        let change = BalanceChange::delete(existing.entry());
        let loan = self.store.apply_balance_change(&mut tx, loan.id, change).await?;

        tx.commit().await?;

        tracing::info!(
            loan_id = %loan.id,
            transaction_id = %existing.id,
            delta = %change.increment(),
            balance = %loan.balance,
            correlation_id = ?context.correlation_id,
            client_ip = ?context.client_ip,
            "Transaction deleted"
        );

        Ok(DeleteTransactionResult { loan })
    }
}
