//! Common test utilities
//!
//! Tests share one database and run in parallel, so nothing is truncated:
//! every test creates its own users and only asserts on its own rows.

#![allow(dead_code)]

use axum::{body::Body, http::Request, Router};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::util::ServiceExt;
use uuid::Uuid;

use loan_ledger::api::middleware::hash_api_key;
use loan_ledger::db;
use loan_ledger::domain::{Amount, LoanType, OperationContext, TransactionMethod};
use loan_ledger::handlers::{
    CreateLoanCommand, CreateLoanHandler, CreateUserCommand, CreateUserHandler, TransactionDetails,
};
use loan_ledger::store::Loan;

/// Key with read and write access to loans and users
pub const API_KEY: &str = "test_key_123";
/// Key that may only read loans
pub const READ_ONLY_KEY: &str = "test_read_key_123";
/// Key with the admin permission
pub const ADMIN_KEY: &str = "test_admin_key_123";

/// Connect, migrate and seed the test API keys
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    db::run_migrations(&pool).await.expect("Failed to run migrations");

    let keys: [(&str, &str, Vec<&str>); 3] = [
        (API_KEY, "test_rw_", vec!["read:loans", "write:loans", "write:users"]),
        (READ_ONLY_KEY, "test_ro_", vec!["read:loans"]),
        (ADMIN_KEY, "test_ad_", vec!["admin"]),
    ];

    for (key, prefix, permissions) in keys {
        sqlx::query(
            r#"
            INSERT INTO api_keys (id, name, key_hash, key_prefix, permissions, is_active)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(format!("Test key {}", prefix))
        .bind(hash_api_key(key))
        .bind(prefix)
        .bind(permissions.iter().map(|p| p.to_string()).collect::<Vec<_>>())
        .execute(&pool)
        .await
        .expect("Failed to seed API key");
    }

    pool
}

/// Register a user with a unique email and return its context
pub async fn create_user(pool: &PgPool) -> OperationContext {
    let user_id = Uuid::new_v4();
    CreateUserHandler::new(pool.clone())
        .execute(
            CreateUserCommand::new("Test User", format!("{}@example.com", user_id)).with_id(user_id),
            &OperationContext::new(),
        )
        .await
        .expect("Failed to create user");

    OperationContext::for_user(user_id)
}

pub fn amount(value: &str) -> Amount {
    value.parse().expect("valid amount")
}

pub fn details() -> TransactionDetails {
    TransactionDetails::new(Utc::now(), TransactionMethod::Cash)
}

/// Open a loan for the context's user
pub async fn create_loan(
    pool: &PgPool,
    context: &OperationContext,
    title: &str,
    initial: &str,
    loan_type: LoanType,
) -> Loan {
    CreateLoanHandler::new(pool.clone())
        .execute(
            CreateLoanCommand::new(title, amount(initial), loan_type, details()),
            context,
        )
        .await
        .expect("Failed to create loan")
        .loan
}

/// Signed sum of a loan's transactions, straight from SQL
pub async fn signed_sum(pool: &PgPool, loan_id: Uuid) -> rust_decimal::Decimal {
    sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(CASE type WHEN 'CREDIT' THEN amount ELSE -amount END), 0)
        FROM transactions WHERE loan_id = $1
        "#,
    )
    .bind(loan_id)
    .fetch_one(pool)
    .await
    .expect("Failed to sum transactions")
}

/// Send a request through the router and decode the JSON body
pub async fn send(app: &Router, request: Request<Body>) -> (axum::http::StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("request failed");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("failed to read body")
        .to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}
