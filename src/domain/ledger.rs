//! Ledger arithmetic
//!
//! A loan's balance is the sum of the signed amounts of its transactions:
//! CREDIT contributes `+amount`, DEBIT contributes `-amount`. Every
//! mutation of a transaction translates into one increment of the stored
//! balance, computed here so that the database layer only ever applies
//! `balance = balance + increment`.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use uuid::Uuid;

use super::{Amount, Balance, DomainError, TransactionType};

/// Balance contribution of one transaction.
pub fn signed_delta(kind: TransactionType, amount: Amount) -> Decimal {
    match kind {
        TransactionType::Credit => amount.value(),
        TransactionType::Debit => -amount.value(),
    }
}

/// The part of a transaction that affects the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerEntry {
    pub kind: TransactionType,
    pub amount: Amount,
}

impl LedgerEntry {
    pub fn new(kind: TransactionType, amount: Amount) -> Self {
        Self { kind, amount }
    }

    pub fn delta(&self) -> Decimal {
        signed_delta(self.kind, self.amount)
    }
}

/// Increment to apply to `Loan.balance` for one ledger mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceChange(Decimal);

impl BalanceChange {
    /// A new transaction adds its signed effect.
    pub fn add(entry: LedgerEntry) -> Self {
        Self(entry.delta())
    }

    /// An edited transaction removes its old effect and applies the new one.
    pub fn edit(old: LedgerEntry, new: LedgerEntry) -> Self {
        Self(new.delta() - old.delta())
    }

    /// A deleted transaction reverses its effect.
    pub fn delete(entry: LedgerEntry) -> Self {
        Self(-entry.delta())
    }

    pub fn increment(&self) -> Decimal {
        self.0
    }
}

/// In-memory ledger of a single loan.
///
/// Holds the balance next to the entries that produced it and applies the
/// same [`BalanceChange`]s the database does. Used to replay a loan's
/// history when reconciling stored balances.
#[derive(Debug, Clone, Default)]
pub struct LoanLedger {
    balance: Balance,
    entries: BTreeMap<Uuid, LedgerEntry>,
}

impl LoanLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from a transaction history.
    pub fn replay<I>(history: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = (Uuid, LedgerEntry)>,
    {
        let mut ledger = Self::new();
        for (id, entry) in history {
            ledger.add(id, entry)?;
        }
        Ok(ledger)
    }

    pub fn balance(&self) -> Balance {
        self.balance
    }

    pub fn transaction_count(&self) -> usize {
        self.entries.len()
    }

    pub fn add(&mut self, id: Uuid, entry: LedgerEntry) -> Result<BalanceChange, DomainError> {
        if self.entries.contains_key(&id) {
            return Err(DomainError::DuplicateTransaction(id));
        }
        let change = BalanceChange::add(entry);
        self.entries.insert(id, entry);
        self.balance = self.balance.apply(change.increment());
        Ok(change)
    }

    pub fn edit(&mut self, id: Uuid, entry: LedgerEntry) -> Result<BalanceChange, DomainError> {
        let slot = self
            .entries
            .get_mut(&id)
            .ok_or(DomainError::UnknownTransaction(id))?;
        let change = BalanceChange::edit(*slot, entry);
        *slot = entry;
        self.balance = self.balance.apply(change.increment());
        Ok(change)
    }

    pub fn remove(&mut self, id: Uuid) -> Result<BalanceChange, DomainError> {
        let entry = self
            .entries
            .remove(&id)
            .ok_or(DomainError::UnknownTransaction(id))?;
        let change = BalanceChange::delete(entry);
        self.balance = self.balance.apply(change.increment());
        Ok(change)
    }

    /// Balance recomputed from scratch, independent of the running total.
    pub fn recomputed_balance(&self) -> Balance {
        Balance::new(self.entries.values().map(LedgerEntry::delta).sum())
    }

    /// Difference between a stored balance and the one implied by the entries.
    pub fn drift(&self, stored: Balance) -> Decimal {
        stored.value() - self.recomputed_balance().value()
    }
}
