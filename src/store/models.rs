//! Persisted models
//!
//! Raw rows as stored in Postgres and the typed records handed to callers.
//! Enum columns are text; converting a row into a record parses them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{
    Amount, Balance, CurrencyCode, LedgerEntry, LoanStatus, TransactionMethod, TransactionType,
};

use super::StoreError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LoanRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub balance: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TransactionRow {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub amount: Decimal,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub date: DateTime<Utc>,
    pub description: Option<String>,
    pub method: String,
    pub method_details: Option<String>,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A loan and its running balance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub balance: Balance,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A signed monetary event against a loan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub amount: Amount,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub date: DateTime<Utc>,
    pub description: Option<String>,
    pub method: TransactionMethod,
    pub method_details: Option<String>,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// The balance-affecting part of this transaction
    pub fn entry(&self) -> LedgerEntry {
        LedgerEntry::new(self.kind, self.amount)
    }
}

/// A loan together with its transactions, newest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanWithTransactions {
    #[serde(flatten)]
    pub loan: Loan,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub currency: CurrencyCode,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The caller-supplied fields of a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionFields {
    pub amount: Amount,
    pub kind: TransactionType,
    pub date: DateTime<Utc>,
    pub description: Option<String>,
    pub method: TransactionMethod,
    pub method_details: Option<String>,
    pub transaction_id: Option<String>,
}

impl TransactionFields {
    pub fn entry(&self) -> LedgerEntry {
        LedgerEntry::new(self.kind, self.amount)
    }
}

/// A loan with the most recent of its transactions, for listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanSummary {
    #[serde(flatten)]
    pub loan: Loan,
    pub latest_transaction: Option<Transaction>,
}

impl TryFrom<LoanRow> for Loan {
    type Error = StoreError;

    fn try_from(row: LoanRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse()
            .map_err(|e| StoreError::corrupt("loans", row.id, e))?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            balance: Balance::new(row.balance),
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let amount = Amount::new(row.amount).map_err(|e| StoreError::corrupt("transactions", id, e))?;
        let kind = row
            .kind
            .parse()
            .map_err(|e| StoreError::corrupt("transactions", id, e))?;
        let method = row
            .method
            .parse()
            .map_err(|e| StoreError::corrupt("transactions", id, e))?;

        Ok(Self {
            id,
            loan_id: row.loan_id,
            amount,
            kind,
            date: row.date,
            description: row.description,
            method,
            method_details: row.method_details,
            transaction_id: row.transaction_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let currency =
            CurrencyCode::new(&row.currency).map_err(|e| StoreError::corrupt("users", row.id, e))?;

        Ok(Self {
            id: row.id,
            name: row.name,
            email: row.email,
            currency,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn transaction_row(amount: Decimal, kind: &str) -> TransactionRow {
        let now = Utc::now();
        TransactionRow {
            id: Uuid::new_v4(),
            loan_id: Uuid::new_v4(),
            amount,
            kind: kind.to_string(),
            date: now,
            description: None,
            method: "CASH".to_string(),
            method_details: None,
            transaction_id: Some("ref-1".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_transaction_row_conversion() {
        let transaction = Transaction::try_from(transaction_row(dec!(40.00), "DEBIT")).unwrap();
        assert_eq!(transaction.kind, TransactionType::Debit);
        assert_eq!(transaction.entry().delta(), dec!(-40));
    }

    #[test]
    fn test_corrupt_transaction_row() {
        let err = Transaction::try_from(transaction_row(dec!(40), "REFUND")).unwrap_err();
        assert!(err.to_string().contains("transactions"));

        let err = Transaction::try_from(transaction_row(dec!(0), "CREDIT")).unwrap_err();
        assert!(matches!(err, StoreError::CorruptRow { table: "transactions", .. }));
    }

    #[test]
    fn test_transaction_json_shape() {
        let transaction = Transaction::try_from(transaction_row(dec!(12.50), "CREDIT")).unwrap();
        let json = serde_json::to_value(&transaction).unwrap();

        assert_eq!(json["type"], "CREDIT");
        assert_eq!(json["method"], "CASH");
        assert_eq!(json["amount"], "12.50");
        assert_eq!(json["transactionId"], "ref-1");
        assert!(json.get("methodDetails").is_some());
    }

    #[test]
    fn test_loan_row_conversion() {
        let now = Utc::now();
        let row = LoanRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Car".to_string(),
            description: None,
            balance: dec!(-100),
            status: "CLOSED".to_string(),
            created_at: now,
            updated_at: now,
        };

        let loan = Loan::try_from(row).unwrap();
        assert_eq!(loan.status, LoanStatus::Closed);

        let json = serde_json::to_value(&loan).unwrap();
        assert_eq!(json["balance"], "-100.00");
        assert_eq!(json["status"], "CLOSED");
    }
}
