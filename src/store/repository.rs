//! Ledger Store
//!
//! SQL access to users, loans and transactions. Write methods take an open
//! database transaction so a handler can lock the loan row, touch the
//! transaction table and move the balance inside one atomic unit.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::domain::{Balance, BalanceChange, CurrencyCode, LoanStatus};

use super::models::{
    Loan, LoanRow, LoanSummary, LoanWithTransactions, Transaction, TransactionFields,
    TransactionRow, User, UserRow,
};
use super::StoreError;

/// An open database transaction
pub type DbTransaction<'c> = sqlx::Transaction<'c, Postgres>;

const LOAN_COLUMNS: &str =
    "id, user_id, title, description, balance, status, created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "id, loan_id, amount, type, date, description, method, \
     method_details, transaction_id, created_at, updated_at";

const USER_COLUMNS: &str = "id, name, email, currency, created_at, updated_at";

/// Number of loans returned by the recent-loans query
pub const RECENT_LOANS_LIMIT: i64 = 4;

/// A loan whose stored balance disagrees with the sum of its transactions
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BalanceDrift {
    pub loan_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub stored_balance: Decimal,
    pub computed_balance: Decimal,
}

impl BalanceDrift {
    pub fn difference(&self) -> Decimal {
        self.stored_balance - self.computed_balance
    }
}

/// Pair each loan with its latest transaction, keeping the loan order
fn attach_latest(loans: Vec<Loan>, latest: Vec<Transaction>) -> Vec<LoanSummary> {
    let mut by_loan: HashMap<Uuid, Transaction> =
        latest.into_iter().map(|t| (t.loan_id, t)).collect();

    loans
        .into_iter()
        .map(|loan| {
            let latest_transaction = by_loan.remove(&loan.id);
            LoanSummary {
                loan,
                latest_transaction,
            }
        })
        .collect()
}

/// Repository over the ledger tables
#[derive(Debug, Clone)]
pub struct LedgerStore {
    pool: PgPool,
}

impl LedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a database transaction
    pub async fn begin(&self) -> Result<DbTransaction<'static>, StoreError> {
        Ok(self.pool.begin().await?)
    }

    // =========================================================================
    // Loans (write side)
    // =========================================================================

    /// Lock a loan row owned by `user_id` for the rest of the transaction
    pub async fn lock_loan(
        &self,
        tx: &mut DbTransaction<'_>,
        user_id: Uuid,
        title: &str,
    ) -> Result<Option<Loan>, StoreError> {
        let sql =
            format!("SELECT {LOAN_COLUMNS} FROM loans WHERE user_id = $1 AND title = $2 FOR UPDATE");
        let row: Option<LoanRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(title)
            .fetch_optional(&mut **tx)
            .await?;

        row.map(Loan::try_from).transpose()
    }

    /// Lock a loan row by id
    pub async fn lock_loan_by_id(
        &self,
        tx: &mut DbTransaction<'_>,
        loan_id: Uuid,
    ) -> Result<Option<Loan>, StoreError> {
        let sql = format!("SELECT {LOAN_COLUMNS} FROM loans WHERE id = $1 FOR UPDATE");
        let row: Option<LoanRow> = sqlx::query_as(&sql)
            .bind(loan_id)
            .fetch_optional(&mut **tx)
            .await?;

        row.map(Loan::try_from).transpose()
    }

    pub async fn insert_loan(
        &self,
        tx: &mut DbTransaction<'_>,
        user_id: Uuid,
        title: &str,
        description: Option<&str>,
    ) -> Result<Loan, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO loans (id, user_id, title, description, balance, status)
            VALUES ($1, $2, $3, $4, 0, $5)
            RETURNING {LOAN_COLUMNS}
            "#
        );
        let row: LoanRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(title)
            .bind(description)
            .bind(LoanStatus::Running.as_str())
            .fetch_one(&mut **tx)
            .await?;

        Loan::try_from(row)
    }

    /// Shift a loan's balance by a signed delta and bump `updated_at`
    pub async fn apply_balance_change(
        &self,
        tx: &mut DbTransaction<'_>,
        loan_id: Uuid,
        change: BalanceChange,
    ) -> Result<Loan, StoreError> {
        let sql = format!(
            r#"
            UPDATE loans
            SET balance = balance + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {LOAN_COLUMNS}
            "#
        );
        let row: LoanRow = sqlx::query_as(&sql)
            .bind(loan_id)
            .bind(change.increment())
            .fetch_one(&mut **tx)
            .await?;

        Loan::try_from(row)
    }

    /// Overwrite a loan's balance, used when repairing drift
    pub async fn set_balance(
        &self,
        tx: &mut DbTransaction<'_>,
        loan_id: Uuid,
        balance: Balance,
    ) -> Result<Loan, StoreError> {
        let sql = format!(
            r#"
            UPDATE loans
            SET balance = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {LOAN_COLUMNS}
            "#
        );
        let row: LoanRow = sqlx::query_as(&sql)
            .bind(loan_id)
            .bind(balance.value())
            .fetch_one(&mut **tx)
            .await?;

        Loan::try_from(row)
    }

    pub async fn update_loan_details(
        &self,
        tx: &mut DbTransaction<'_>,
        loan_id: Uuid,
        title: &str,
        description: Option<&str>,
        status: LoanStatus,
    ) -> Result<Loan, StoreError> {
        let sql = format!(
            r#"
            UPDATE loans
            SET title = $2, description = $3, status = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {LOAN_COLUMNS}
            "#
        );
        let row: LoanRow = sqlx::query_as(&sql)
            .bind(loan_id)
            .bind(title)
            .bind(description)
            .bind(status.as_str())
            .fetch_one(&mut **tx)
            .await?;

        Loan::try_from(row)
    }

    /// Delete a loan and its transactions, returning how many transactions
    /// were removed
    pub async fn delete_loan(
        &self,
        tx: &mut DbTransaction<'_>,
        loan_id: Uuid,
    ) -> Result<u64, StoreError> {
        let removed = sqlx::query("DELETE FROM transactions WHERE loan_id = $1")
            .bind(loan_id)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM loans WHERE id = $1")
            .bind(loan_id)
            .execute(&mut **tx)
            .await?;

        Ok(removed)
    }

    // =========================================================================
    // Transactions (write side)
    // =========================================================================

    pub async fn insert_transaction(
        &self,
        tx: &mut DbTransaction<'_>,
        loan_id: Uuid,
        fields: &TransactionFields,
    ) -> Result<Transaction, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO transactions
                (id, loan_id, amount, type, date, description, method, method_details, transaction_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );
        let row: TransactionRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(loan_id)
            .bind(fields.amount.value())
            .bind(fields.kind.as_str())
            .bind(fields.date)
            .bind(fields.description.as_deref())
            .bind(fields.method.as_str())
            .bind(fields.method_details.as_deref())
            .bind(fields.transaction_id.as_deref())
            .fetch_one(&mut **tx)
            .await?;

        Transaction::try_from(row)
    }

    /// Lock a transaction row belonging to `loan_id`
    pub async fn lock_transaction(
        &self,
        tx: &mut DbTransaction<'_>,
        loan_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<Option<Transaction>, StoreError> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1 AND loan_id = $2 FOR UPDATE"
        );
        let row: Option<TransactionRow> = sqlx::query_as(&sql)
            .bind(transaction_id)
            .bind(loan_id)
            .fetch_optional(&mut **tx)
            .await?;

        row.map(Transaction::try_from).transpose()
    }

    /// Replace every caller-supplied field of a transaction
    pub async fn update_transaction(
        &self,
        tx: &mut DbTransaction<'_>,
        transaction_id: Uuid,
        fields: &TransactionFields,
    ) -> Result<Transaction, StoreError> {
        let sql = format!(
            r#"
            UPDATE transactions
            SET amount = $2, type = $3, date = $4, description = $5, method = $6,
                method_details = $7, transaction_id = $8, updated_at = NOW()
            WHERE id = $1
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );
        let row: TransactionRow = sqlx::query_as(&sql)
            .bind(transaction_id)
            .bind(fields.amount.value())
            .bind(fields.kind.as_str())
            .bind(fields.date)
            .bind(fields.description.as_deref())
            .bind(fields.method.as_str())
            .bind(fields.method_details.as_deref())
            .bind(fields.transaction_id.as_deref())
            .fetch_one(&mut **tx)
            .await?;

        Transaction::try_from(row)
    }

    pub async fn delete_transaction(
        &self,
        tx: &mut DbTransaction<'_>,
        transaction_id: Uuid,
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(transaction_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// All transactions of a loan inside an open transaction, oldest first
    pub async fn loan_history(
        &self,
        tx: &mut DbTransaction<'_>,
        loan_id: Uuid,
    ) -> Result<Vec<Transaction>, StoreError> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE loan_id = $1 ORDER BY date ASC, created_at ASC"
        );
        let rows: Vec<TransactionRow> = sqlx::query_as(&sql)
            .bind(loan_id)
            .fetch_all(&mut **tx)
            .await?;

        rows.into_iter().map(Transaction::try_from).collect()
    }

    // =========================================================================
    // Loans (read side)
    // =========================================================================

    /// Loans of a user, most recently updated first, each with its latest
    /// transaction
    pub async fn list_loans(
        &self,
        user_id: Uuid,
        status: Option<LoanStatus>,
        limit: Option<i64>,
    ) -> Result<Vec<LoanSummary>, StoreError> {
        let sql = format!(
            r#"
            SELECT {LOAN_COLUMNS} FROM loans
            WHERE user_id = $1 AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY updated_at DESC
            LIMIT $3
            "#
        );
        let rows: Vec<LoanRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(status.map(|s| s.as_str()))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        let loans = rows
            .into_iter()
            .map(Loan::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let loan_ids: Vec<Uuid> = loans.iter().map(|loan| loan.id).collect();
        let latest = self.latest_transactions(&loan_ids).await?;

        Ok(attach_latest(loans, latest))
    }

    pub async fn recent_loans(&self, user_id: Uuid) -> Result<Vec<LoanSummary>, StoreError> {
        self.list_loans(user_id, None, Some(RECENT_LOANS_LIMIT)).await
    }

    async fn latest_transactions(&self, loan_ids: &[Uuid]) -> Result<Vec<Transaction>, StoreError> {
        if loan_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT DISTINCT ON (loan_id) {TRANSACTION_COLUMNS} FROM transactions
            WHERE loan_id = ANY($1)
            ORDER BY loan_id, date DESC, created_at DESC
            "#
        );
        let rows: Vec<TransactionRow> = sqlx::query_as(&sql)
            .bind(loan_ids)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Transaction::try_from).collect()
    }

    pub async fn find_loan(&self, user_id: Uuid, title: &str) -> Result<Option<Loan>, StoreError> {
        let sql = format!("SELECT {LOAN_COLUMNS} FROM loans WHERE user_id = $1 AND title = $2");
        let row: Option<LoanRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(title)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Loan::try_from).transpose()
    }

    /// A loan with all of its transactions, newest first
    pub async fn get_loan(
        &self,
        user_id: Uuid,
        title: &str,
    ) -> Result<Option<LoanWithTransactions>, StoreError> {
        let Some(loan) = self.find_loan(user_id, title).await? else {
            return Ok(None);
        };

        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE loan_id = $1 ORDER BY date DESC, created_at DESC"
        );
        let rows: Vec<TransactionRow> = sqlx::query_as(&sql)
            .bind(loan.id)
            .fetch_all(&self.pool)
            .await?;

        let transactions = rows
            .into_iter()
            .map(Transaction::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(LoanWithTransactions { loan, transactions }))
    }

    pub async fn find_transaction(
        &self,
        loan_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<Option<Transaction>, StoreError> {
        let sql =
            format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1 AND loan_id = $2");
        let row: Option<TransactionRow> = sqlx::query_as(&sql)
            .bind(transaction_id)
            .bind(loan_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Transaction::try_from).transpose()
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub async fn insert_user(
        &self,
        user_id: Uuid,
        name: &str,
        email: &str,
        currency: &CurrencyCode,
    ) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO users (id, name, email, currency)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        );
        let row: UserRow = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(name)
            .bind(email)
            .bind(currency.as_str())
            .fetch_one(&self.pool)
            .await?;

        User::try_from(row)
    }

    pub async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(User::try_from).transpose()
    }

    /// Whether the user exists, checked inside an open transaction
    pub async fn user_exists(
        &self,
        tx: &mut DbTransaction<'_>,
        user_id: Uuid,
    ) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&mut **tx)
            .await?;
        Ok(exists)
    }

    /// Update the profile fields that were supplied; `None` keeps the old value
    pub async fn update_user(
        &self,
        user_id: Uuid,
        name: Option<&str>,
        currency: Option<&CurrencyCode>,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name), currency = COALESCE($3, currency), updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(name)
            .bind(currency.map(CurrencyCode::as_str))
            .fetch_optional(&self.pool)
            .await?;

        row.map(User::try_from).transpose()
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Loans whose stored balance differs from the signed sum of their
    /// transactions
    pub async fn find_balance_drift(&self) -> Result<Vec<BalanceDrift>, StoreError> {
        let drift = sqlx::query_as::<_, BalanceDrift>(
            r#"
            SELECT
                l.id AS loan_id,
                l.user_id,
                l.title,
                l.balance AS stored_balance,
                COALESCE(SUM(
                    CASE t.type WHEN 'CREDIT' THEN t.amount ELSE -t.amount END
                ), 0) AS computed_balance
            FROM loans l
            LEFT JOIN transactions t ON t.loan_id = l.id
            GROUP BY l.id, l.user_id, l.title, l.balance
            HAVING l.balance <> COALESCE(SUM(
                CASE t.type WHEN 'CREDIT' THEN t.amount ELSE -t.amount END
            ), 0)
            ORDER BY l.updated_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(drift)
    }
}
