//! Ledger enums
//!
//! Persisted as upper-case text and exchanged as SCREAMING_SNAKE_CASE JSON.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::DomainError;

/// Sign convention of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Increases the loan balance
    Credit,
    /// Decreases the loan balance
    Debit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Credit => "CREDIT",
            TransactionType::Debit => "DEBIT",
        }
    }
}

/// Payment channel of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionMethod {
    Cash,
    BankTransfer,
    Check,
    CreditCard,
    DebitCard,
    MobileBanking,
    Other,
}

impl TransactionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionMethod::Cash => "CASH",
            TransactionMethod::BankTransfer => "BANK_TRANSFER",
            TransactionMethod::Check => "CHECK",
            TransactionMethod::CreditCard => "CREDIT_CARD",
            TransactionMethod::DebitCard => "DEBIT_CARD",
            TransactionMethod::MobileBanking => "MOBILE_BANKING",
            TransactionMethod::Other => "OTHER",
        }
    }
}

/// Lifecycle state of a loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    #[default]
    Running,
    Closed,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Running => "RUNNING",
            LoanStatus::Closed => "CLOSED",
        }
    }
}

/// Direction of a new loan. Only used when creating a loan to pick the
/// sign of the opening balance and the type of the seed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanType {
    /// Money lent out: opening balance is positive
    Lend,
    /// Money borrowed: opening balance is negative
    Borrow,
}

impl LoanType {
    /// Type of the transaction that seeds a loan of this direction
    pub fn seed_transaction_type(&self) -> TransactionType {
        match self {
            LoanType::Lend => TransactionType::Credit,
            LoanType::Borrow => TransactionType::Debit,
        }
    }
}

macro_rules! impl_text_enum {
    ($ty:ident, $name:literal, [$($variant:ident),+ $(,)?]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s == $ty::$variant.as_str() {
                        return Ok($ty::$variant);
                    }
                )+
                Err(DomainError::UnknownVariant {
                    kind: $name,
                    value: s.to_string(),
                })
            }
        }
    };
}

impl_text_enum!(TransactionType, "transaction type", [Credit, Debit]);
impl_text_enum!(
    TransactionMethod,
    "transaction method",
    [Cash, BankTransfer, Check, CreditCard, DebitCard, MobileBanking, Other]
);
impl_text_enum!(LoanStatus, "loan status", [Running, Closed]);

/// ISO 4217 currency code used for display preferences.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: &str) -> Result<Self, DomainError> {
        let code = code.trim().to_ascii_uppercase();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DomainError::InvalidCurrency(code));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self("USD".to_string())
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CurrencyCode::new(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}
