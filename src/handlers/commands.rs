//! Command definitions
//!
//! Commands represent intentions to change the ledger. Money and enum
//! fields arrive already typed; free-text fields are normalized here.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{
    Amount, CurrencyCode, DomainError, LoanStatus, LoanType, TransactionMethod, TransactionType,
};
use crate::store::{Loan, Transaction, TransactionFields};

/// Longest accepted loan title, in characters
pub const MAX_TITLE_LEN: usize = 255;

/// Shortest accepted user name, in characters
pub const MIN_NAME_LEN: usize = 2;

/// Trim a loan title and check its length
pub fn normalize_title(raw: &str) -> Result<String, DomainError> {
    let title = raw.trim();
    let len = title.chars().count();
    if len == 0 {
        return Err(DomainError::InvalidTitle("title must not be empty".to_string()));
    }
    if len > MAX_TITLE_LEN {
        return Err(DomainError::InvalidTitle(format!(
            "title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(title.to_string())
}

/// Empty or blank optional text is stored as NULL
pub fn normalize_text(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

// =========================================================================
// Transactions
// =========================================================================

/// Non-monetary details of a transaction
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDetails {
    pub date: DateTime<Utc>,
    pub description: Option<String>,
    pub method: TransactionMethod,
    pub method_details: Option<String>,
    pub transaction_id: Option<String>,
}

impl TransactionDetails {
    pub fn new(date: DateTime<Utc>, method: TransactionMethod) -> Self {
        Self {
            date,
            description: None,
            method,
            method_details: None,
            transaction_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_method_details(mut self, details: impl Into<String>) -> Self {
        self.method_details = Some(details.into());
        self
    }

    pub fn with_transaction_id(mut self, reference: impl Into<String>) -> Self {
        self.transaction_id = Some(reference.into());
        self
    }

    /// Combine with an amount and type into the full set of stored fields
    pub fn into_fields(self, amount: Amount, kind: TransactionType) -> TransactionFields {
        TransactionFields {
            amount,
            kind,
            date: self.date,
            description: normalize_text(self.description),
            method: self.method,
            method_details: normalize_text(self.method_details),
            transaction_id: normalize_text(self.transaction_id),
        }
    }
}

/// Command to record a transaction against a loan
#[derive(Debug, Clone)]
pub struct AddTransactionCommand {
    pub loan_title: String,
    pub amount: Amount,
    pub kind: TransactionType,
    pub details: TransactionDetails,
}

impl AddTransactionCommand {
    pub fn new(
        loan_title: impl Into<String>,
        amount: Amount,
        kind: TransactionType,
        details: TransactionDetails,
    ) -> Self {
        Self {
            loan_title: loan_title.into(),
            amount,
            kind,
            details,
        }
    }

    pub fn fields(&self) -> TransactionFields {
        self.details.clone().into_fields(self.amount, self.kind)
    }
}

/// Command to replace every field of an existing transaction
#[derive(Debug, Clone)]
pub struct EditTransactionCommand {
    pub loan_title: String,
    pub transaction_id: Uuid,
    pub amount: Amount,
    pub kind: TransactionType,
    pub details: TransactionDetails,
}

impl EditTransactionCommand {
    pub fn fields(&self) -> TransactionFields {
        self.details.clone().into_fields(self.amount, self.kind)
    }
}

/// Command to remove a transaction and reverse its effect
#[derive(Debug, Clone)]
pub struct DeleteTransactionCommand {
    pub loan_title: String,
    pub transaction_id: Uuid,
}

// =========================================================================
// Loans
// =========================================================================

/// Command to open a loan with its seed transaction
#[derive(Debug, Clone)]
pub struct CreateLoanCommand {
    pub title: String,
    pub description: Option<String>,
    pub initial_balance: Amount,
    pub loan_type: LoanType,
    pub details: TransactionDetails,
}

impl CreateLoanCommand {
    pub fn new(
        title: impl Into<String>,
        initial_balance: Amount,
        loan_type: LoanType,
        details: TransactionDetails,
    ) -> Self {
        Self {
            title: title.into(),
            description: None,
            initial_balance,
            loan_type,
            details,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The seed transaction: CREDIT for a loan given, DEBIT for one taken
    pub fn seed_fields(&self) -> TransactionFields {
        self.details
            .clone()
            .into_fields(self.initial_balance, self.loan_type.seed_transaction_type())
    }
}

/// Command to rename, describe, or open/close a loan
#[derive(Debug, Clone, Default)]
pub struct UpdateLoanCommand {
    pub loan_title: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<LoanStatus>,
}

impl UpdateLoanCommand {
    pub fn new(loan_title: impl Into<String>) -> Self {
        Self {
            loan_title: loan_title.into(),
            ..Default::default()
        }
    }

    pub fn rename(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_status(mut self, status: LoanStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Command to delete a loan and all of its transactions
#[derive(Debug, Clone)]
pub struct DeleteLoanCommand {
    pub loan_title: String,
}

// =========================================================================
// Users
// =========================================================================

/// Command to register a user
#[derive(Debug, Clone)]
pub struct CreateUserCommand {
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub currency: CurrencyCode,
}

impl CreateUserCommand {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: None,
            name: name.into(),
            email: email.into(),
            currency: CurrencyCode::default(),
        }
    }

    pub fn with_id(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_currency(mut self, currency: CurrencyCode) -> Self {
        self.currency = currency;
        self
    }

    /// Trimmed name and lowercased email, or the first rule they break
    pub fn validate(&self) -> Result<(String, String), DomainError> {
        let name = validate_name(&self.name)?;
        let email = self.email.trim().to_lowercase();
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err(DomainError::InvalidUser(format!("invalid email: {}", self.email)));
        }
        Ok((name, email))
    }
}

/// Command to change a user's display name or currency
#[derive(Debug, Clone, Default)]
pub struct UpdateProfileCommand {
    pub name: Option<String>,
    pub currency: Option<CurrencyCode>,
}

pub(crate) fn validate_name(raw: &str) -> Result<String, DomainError> {
    let name = raw.trim();
    if name.chars().count() < MIN_NAME_LEN {
        return Err(DomainError::InvalidUser(format!(
            "name must be at least {} characters",
            MIN_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

// =========================================================================
// Results
// =========================================================================

/// Result of opening a loan
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLoanResult {
    pub loan: Loan,
    pub transaction: Transaction,
}

/// Result of adding or editing a transaction
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
    pub transaction: Transaction,
    pub loan: Loan,
}

/// Result of deleting a transaction
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTransactionResult {
    pub loan: Loan,
}
