//! Scheduled Jobs
//!
//! Balance reconciliation. Balances are maintained by increments, so a
//! write that lost its increment would leave a loan silently wrong. These
//! jobs recompute every balance from the transaction history, report the
//! loans that drifted and optionally rewrite them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use std::time::Duration;
use tokio::time::interval;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{Balance, DomainError, LoanLedger};
use crate::error::AppError;
use crate::store::{BalanceDrift, DbTransaction, LedgerStore, Loan, StoreError};

// =========================================================================
// Drift detection
// =========================================================================

/// Loans whose stored balance differs from the signed sum of their
/// transactions
pub async fn find_balance_drift(pool: &PgPool) -> Result<Vec<BalanceDrift>, JobError> {
    let drift = LedgerStore::new(pool.clone()).find_balance_drift().await?;

    if !drift.is_empty() {
        tracing::warn!(loans = drift.len(), "Balance drift detected");
    }

    Ok(drift)
}

/// Outcome of replaying one loan's history
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanVerification {
    pub loan_id: Uuid,
    pub stored_balance: Balance,
    pub computed_balance: Balance,
    pub drift: Decimal,
    pub transaction_count: usize,
}

impl LoanVerification {
    pub fn is_consistent(&self) -> bool {
        self.drift.is_zero()
    }
}

/// Lock a loan and replay its history through a [`LoanLedger`]
async fn replay_locked(
    store: &LedgerStore,
    tx: &mut DbTransaction<'_>,
    loan_id: Uuid,
) -> Result<(Loan, LoanVerification), JobError> {
    let loan = store
        .lock_loan_by_id(tx, loan_id)
        .await?
        .ok_or(JobError::LoanNotFound(loan_id))?;

    let history = store.loan_history(tx, loan_id).await?;
    let ledger = LoanLedger::replay(history.iter().map(|t| (t.id, t.entry())))?;

    let verification = LoanVerification {
        loan_id,
        stored_balance: loan.balance,
        computed_balance: ledger.recomputed_balance(),
        drift: ledger.drift(loan.balance),
        transaction_count: ledger.transaction_count(),
    };

    Ok((loan, verification))
}

/// Recompute one loan's balance without changing anything
pub async fn verify_loan(pool: &PgPool, loan_id: Uuid) -> Result<LoanVerification, JobError> {
    let store = LedgerStore::new(pool.clone());
    let mut tx = store.begin().await?;
    let (_, verification) = replay_locked(&store, &mut tx, loan_id).await?;
    tx.rollback().await?;
    Ok(verification)
}

// =========================================================================
// Repair
// =========================================================================

/// Result of repairing one loan
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairOutcome {
    pub verification: LoanVerification,
    pub repaired: bool,
    pub loan: Loan,
}

/// Rewrite a loan's balance to the sum of its transactions. Holds the
/// loan lock for the whole replay so no ledger mutation interleaves.
pub async fn repair_loan(pool: &PgPool, loan_id: Uuid) -> Result<RepairOutcome, JobError> {
    let store = LedgerStore::new(pool.clone());
    let mut tx = store.begin().await?;
    let (loan, verification) = replay_locked(&store, &mut tx, loan_id).await?;

    if verification.is_consistent() {
        tx.rollback().await?;
        return Ok(RepairOutcome {
            verification,
            repaired: false,
            loan,
        });
    }

    let loan = store
        .set_balance(&mut tx, loan_id, verification.computed_balance)
        .await?;
    tx.commit().await?;

    tracing::warn!(
        loan_id = %loan_id,
        stored = %verification.stored_balance,
        computed = %verification.computed_balance,
        "Repaired drifted loan balance"
    );

    Ok(RepairOutcome {
        verification,
        repaired: true,
        loan,
    })
}

// =========================================================================
// Job Scheduler
// =========================================================================

/// Configuration for job scheduler
#[derive(Debug, Clone)]
pub struct JobSchedulerConfig {
    /// Interval between reconciliation runs (default: 1 hour)
    pub reconcile_interval: Duration,
    /// Repair drifted loans instead of only reporting them
    pub auto_repair: bool,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self {
            reconcile_interval: Duration::from_secs(3600),
            auto_repair: false,
        }
    }
}

impl JobSchedulerConfig {
    /// Scheduler settings from the application config, `None` when the
    /// job is disabled
    pub fn from_config(config: &Config) -> Option<Self> {
        config.reconcile_interval.map(|reconcile_interval| Self {
            reconcile_interval,
            auto_repair: config.reconcile_auto_repair,
        })
    }
}

/// Job Scheduler - runs balance reconciliation periodically
pub struct JobScheduler {
    pool: PgPool,
    config: JobSchedulerConfig,
}

impl JobScheduler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            config: JobSchedulerConfig::default(),
        }
    }

    pub fn with_config(pool: PgPool, config: JobSchedulerConfig) -> Self {
        Self { pool, config }
    }

    /// Start the job scheduler in the background
    /// Returns a handle that can be used to abort the scheduler
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        tracing::info!(
            interval_secs = self.config.reconcile_interval.as_secs(),
            auto_repair = self.config.auto_repair,
            "Job scheduler started"
        );

        let mut reconcile_interval = interval(self.config.reconcile_interval);

        loop {
            reconcile_interval.tick().await;
            let report = self.run_once().await;
            if report.is_clean() {
                tracing::info!("Reconciliation finished, all balances consistent");
            } else {
                tracing::warn!(
                    drifted = report.drifted.len(),
                    repaired = report.repaired.len(),
                    errors = report.errors.len(),
                    "Reconciliation finished with findings"
                );
            }
        }
    }

    /// Run reconciliation once (for manual trigger or testing)
    pub async fn run_once(&self) -> ReconciliationReport {
        let mut report = ReconciliationReport::new();

        match find_balance_drift(&self.pool).await {
            Ok(drifted) => report.drifted = drifted,
            Err(e) => report.errors.push(format!("Drift scan: {}", e)),
        }

        if self.config.auto_repair {
            for drift in &report.drifted {
                match repair_loan(&self.pool, drift.loan_id).await {
                    Ok(outcome) if outcome.repaired => report.repaired.push(drift.loan_id),
                    Ok(_) => {}
                    Err(e) => report
                        .errors
                        .push(format!("Repair of {}: {}", drift.loan_id, e)),
                }
            }
        }

        report.completed_at = Utc::now();
        report
    }
}

/// Report from one reconciliation run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub drifted: Vec<BalanceDrift>,
    pub repaired: Vec<Uuid>,
    pub errors: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

impl ReconciliationReport {
    fn new() -> Self {
        Self {
            drifted: Vec::new(),
            repaired: Vec::new(),
            errors: Vec::new(),
            completed_at: Utc::now(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.drifted.is_empty() && self.errors.is_empty()
    }
}

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Stored history cannot be replayed: {0}")]
    Replay(#[from] DomainError),

    #[error("Loan not found: {0}")]
    LoanNotFound(Uuid),
}

impl From<JobError> for AppError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::Database(e) => AppError::Database(e),
            JobError::Store(e) => e.into(),
            JobError::Replay(e) => AppError::Internal(e.to_string()),
            JobError::LoanNotFound(id) => AppError::LoanNotFound(id.to_string()),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
