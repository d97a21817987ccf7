//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{
    Amount, CurrencyCode, LoanStatus, LoanType, OperationContext, TransactionMethod,
    TransactionType,
};
use crate::error::AppError;
use crate::handlers::{
    AddTransactionCommand, AddTransactionHandler, CreateLoanCommand, CreateLoanHandler,
    CreateLoanResult, CreateUserCommand, CreateUserHandler, DeleteLoanCommand, DeleteLoanHandler,
    DeleteTransactionCommand, DeleteTransactionHandler, DeleteTransactionResult,
    EditTransactionCommand, EditTransactionHandler, LoanQueryHandler, TransactionDetails,
    TransactionResult, UpdateLoanCommand, UpdateLoanHandler, UpdateProfileCommand,
    UpdateProfileHandler,
};
use crate::jobs::{self, JobScheduler, ReconciliationReport, RepairOutcome};
use crate::store::{Loan, LoanSummary, LoanWithTransactions, Transaction, User};

use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::middleware::{permissions, AuthenticatedApiKey};

// =========================================================================
// Request/Response types
// =========================================================================

/// Success envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            data,
        })
    }

    pub fn with_message(message: &'static str, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message),
            data,
        })
    }
}

/// Accept RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC)
pub fn parse_date(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Ok(date.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| format!("invalid date: {}", raw))
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub amount: Amount,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    #[serde(deserialize_with = "deserialize_date")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
    pub method: TransactionMethod,
    #[serde(default)]
    pub method_details: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

impl TransactionRequest {
    fn details(&self) -> TransactionDetails {
        TransactionDetails {
            date: self.date,
            description: self.description.clone(),
            method: self.method,
            method_details: self.method_details.clone(),
            transaction_id: self.transaction_id.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedTransactionRequest {
    #[serde(deserialize_with = "deserialize_date")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
    pub method: TransactionMethod,
    #[serde(default)]
    pub method_details: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLoanRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub initial_balance: Amount,
    #[serde(rename = "type")]
    pub loan_type: LoanType,
    pub transaction_details: SeedTransactionRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLoanRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<LoanStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ListLoansQuery {
    #[serde(default)]
    pub status: Option<LoanStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedLoan {
    pub title: String,
    #[serde(flatten)]
    pub result: CreateLoanResult,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<PgPool> {
    Router::new()
        .route("/users", post(create_user))
        .route("/profile", get(get_profile).patch(update_profile))
        .route("/loans", get(list_loans).post(create_loan))
        .route("/recent-loans", get(recent_loans))
        .route(
            "/loans/:title",
            get(get_loan).patch(update_loan).delete(delete_loan),
        )
        .route("/loans/:title/transactions", post(add_transaction))
        .route(
            "/loans/:title/transactions/:transaction_id",
            get(get_transaction)
                .patch(edit_transaction)
                .delete(delete_transaction),
        )
        .route("/admin/reconciliation", get(reconciliation_report))
        .route("/admin/reconciliation/:loan_id/repair", post(repair_loan))
}

// =========================================================================
// Users
// =========================================================================

async fn create_user(
    State(pool): State<PgPool>,
    Extension(api_key): Extension<AuthenticatedApiKey>,
    Extension(context): Extension<OperationContext>,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<User>>), AppError> {
    api_key.require(permissions::WRITE_USERS)?;

    let mut command = CreateUserCommand::new(request.name, request.email);
    if let Some(id) = request.id {
        command = command.with_id(id);
    }
    if let Some(currency) = request.currency {
        command = command.with_currency(currency);
    }

    let user = CreateUserHandler::new(pool).execute(command, &context).await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("User created successfully", user),
    ))
}

async fn get_profile(
    State(pool): State<PgPool>,
    Extension(api_key): Extension<AuthenticatedApiKey>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    api_key.require(permissions::READ_LOANS)?;
    let user = LoanQueryHandler::new(pool).get_profile(&context).await?;
    Ok(ApiResponse::ok(user))
}

async fn update_profile(
    State(pool): State<PgPool>,
    Extension(api_key): Extension<AuthenticatedApiKey>,
    Extension(context): Extension<OperationContext>,
    ApiJson(request): ApiJson<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    api_key.require(permissions::WRITE_USERS)?;

    let command = UpdateProfileCommand {
        name: request.name,
        currency: request.currency,
    };
    let user = UpdateProfileHandler::new(pool)
        .execute(command, &context)
        .await?;

    Ok(ApiResponse::with_message("Profile updated successfully", user))
}

// =========================================================================
// Loans
// =========================================================================

async fn list_loans(
    State(pool): State<PgPool>,
    Extension(api_key): Extension<AuthenticatedApiKey>,
    Extension(context): Extension<OperationContext>,
    ApiQuery(query): ApiQuery<ListLoansQuery>,
) -> Result<Json<ApiResponse<Vec<LoanSummary>>>, AppError> {
    api_key.require(permissions::READ_LOANS)?;
    let loans = LoanQueryHandler::new(pool)
        .list_loans(query.status, &context)
        .await?;
    Ok(ApiResponse::ok(loans))
}

async fn recent_loans(
    State(pool): State<PgPool>,
    Extension(api_key): Extension<AuthenticatedApiKey>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<ApiResponse<Vec<LoanSummary>>>, AppError> {
    api_key.require(permissions::READ_LOANS)?;
    let loans = LoanQueryHandler::new(pool).recent_loans(&context).await?;
    Ok(ApiResponse::ok(loans))
}

async fn create_loan(
    State(pool): State<PgPool>,
    Extension(api_key): Extension<AuthenticatedApiKey>,
    Extension(context): Extension<OperationContext>,
    ApiJson(request): ApiJson<CreateLoanRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedLoan>>), AppError> {
    api_key.require(permissions::WRITE_LOANS)?;

    let seed = request.transaction_details;
    let details = TransactionDetails {
        date: seed.date,
        description: seed.description,
        method: seed.method,
        method_details: seed.method_details,
        transaction_id: seed.transaction_id,
    };
    let mut command = CreateLoanCommand::new(
        request.title,
        request.initial_balance,
        request.loan_type,
        details,
    );
    command.description = request.description;

    let result = CreateLoanHandler::new(pool).execute(command, &context).await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(
            "Loan created successfully",
            CreatedLoan {
                title: result.loan.title.clone(),
                result,
            },
        ),
    ))
}

async fn get_loan(
    State(pool): State<PgPool>,
    Extension(api_key): Extension<AuthenticatedApiKey>,
    Extension(context): Extension<OperationContext>,
    ApiPath(title): ApiPath<String>,
) -> Result<Json<ApiResponse<LoanWithTransactions>>, AppError> {
    api_key.require(permissions::READ_LOANS)?;
    let loan = LoanQueryHandler::new(pool).get_loan(&title, &context).await?;
    Ok(ApiResponse::ok(loan))
}

async fn update_loan(
    State(pool): State<PgPool>,
    Extension(api_key): Extension<AuthenticatedApiKey>,
    Extension(context): Extension<OperationContext>,
    ApiPath(title): ApiPath<String>,
    ApiJson(request): ApiJson<UpdateLoanRequest>,
) -> Result<Json<ApiResponse<Loan>>, AppError> {
    api_key.require(permissions::WRITE_LOANS)?;

    let command = UpdateLoanCommand {
        loan_title: title,
        title: request.title,
        description: request.description,
        status: request.status,
    };
    let loan = UpdateLoanHandler::new(pool).execute(command, &context).await?;

    Ok(ApiResponse::with_message("Loan updated successfully", loan))
}

async fn delete_loan(
    State(pool): State<PgPool>,
    Extension(api_key): Extension<AuthenticatedApiKey>,
    Extension(context): Extension<OperationContext>,
    ApiPath(title): ApiPath<String>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    api_key.require(permissions::WRITE_LOANS)?;

    DeleteLoanHandler::new(pool)
        .execute(DeleteLoanCommand { loan_title: title }, &context)
        .await?;

    Ok(ApiResponse::with_message("Loan deleted successfully", ()))
}

// =========================================================================
// Transactions
// =========================================================================

async fn add_transaction(
    State(pool): State<PgPool>,
    Extension(api_key): Extension<AuthenticatedApiKey>,
    Extension(context): Extension<OperationContext>,
    ApiPath(title): ApiPath<String>,
    ApiJson(request): ApiJson<TransactionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TransactionResult>>), AppError> {
    api_key.require(permissions::WRITE_LOANS)?;

    let command =
        AddTransactionCommand::new(title, request.amount, request.kind, request.details());
    let result = AddTransactionHandler::new(pool)
        .execute(command, &context)
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Transaction added successfully", result),
    ))
}

async fn get_transaction(
    State(pool): State<PgPool>,
    Extension(api_key): Extension<AuthenticatedApiKey>,
    Extension(context): Extension<OperationContext>,
    ApiPath((title, transaction_id)): ApiPath<(String, Uuid)>,
) -> Result<Json<ApiResponse<Transaction>>, AppError> {
    api_key.require(permissions::READ_LOANS)?;
    let transaction = LoanQueryHandler::new(pool)
        .get_transaction(&title, transaction_id, &context)
        .await?;
    Ok(ApiResponse::ok(transaction))
}

async fn edit_transaction(
    State(pool): State<PgPool>,
    Extension(api_key): Extension<AuthenticatedApiKey>,
    Extension(context): Extension<OperationContext>,
    ApiPath((title, transaction_id)): ApiPath<(String, Uuid)>,
    ApiJson(request): ApiJson<TransactionRequest>,
) -> Result<Json<ApiResponse<TransactionResult>>, AppError> {
    api_key.require(permissions::WRITE_LOANS)?;

    let command = EditTransactionCommand {
        loan_title: title,
        transaction_id,
        amount: request.amount,
        kind: request.kind,
        details: request.details(),
    };
    let result = EditTransactionHandler::new(pool)
        .execute(command, &context)
        .await?;

    Ok(ApiResponse::with_message("Transaction updated successfully", result))
}

async fn delete_transaction(
    State(pool): State<PgPool>,
    Extension(api_key): Extension<AuthenticatedApiKey>,
    Extension(context): Extension<OperationContext>,
    ApiPath((title, transaction_id)): ApiPath<(String, Uuid)>,
) -> Result<Json<ApiResponse<DeleteTransactionResult>>, AppError> {
    api_key.require(permissions::WRITE_LOANS)?;

    let command = DeleteTransactionCommand {
        loan_title: title,
        transaction_id,
    };
    let result = DeleteTransactionHandler::new(pool)
        .execute(command, &context)
        .await?;

    Ok(ApiResponse::with_message("Transaction deleted successfully", result))
}

// =========================================================================
// Admin
// =========================================================================

/// Scan every loan for balance drift without repairing it
async fn reconciliation_report(
    State(pool): State<PgPool>,
    Extension(api_key): Extension<AuthenticatedApiKey>,
) -> Result<Json<ApiResponse<ReconciliationReport>>, AppError> {
    api_key.require(permissions::ADMIN)?;
    let report = JobScheduler::new(pool).run_once().await;
    Ok(ApiResponse::ok(report))
}

async fn repair_loan(
    State(pool): State<PgPool>,
    Extension(api_key): Extension<AuthenticatedApiKey>,
    ApiPath(loan_id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<RepairOutcome>>, AppError> {
    api_key.require(permissions::ADMIN)?;
    let outcome = jobs::repair_loan(&pool, loan_id).await?;
    Ok(ApiResponse::ok(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_date() {
        let midnight = parse_date("2024-03-01").unwrap();
        assert_eq!(midnight.to_rfc3339(), "2024-03-01T00:00:00+00:00");

        let offset = parse_date("2024-03-01T10:00:00+02:00").unwrap();
        assert_eq!(offset.to_rfc3339(), "2024-03-01T08:00:00+00:00");

        assert!(parse_date("01/03/2024").is_err());
    }

    #[test]
    fn test_transaction_request_deserialize() {
        let json = r#"{
            "amount": "40.50",
            "type": "DEBIT",
            "date": "2024-03-01T00:00:00Z",
            "method": "BANK_TRANSFER",
            "methodDetails": "IBAN ending 42"
        }"#;

        let request: TransactionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.amount.value(), dec!(40.50));
        assert_eq!(request.kind, TransactionType::Debit);
        assert_eq!(request.method, TransactionMethod::BankTransfer);
        assert!(request.transaction_id.is_none());
    }

    #[test]
    fn test_transaction_request_rejects_bad_values() {
        let non_positive = r#"{"amount": 0, "type": "CREDIT", "date": "2024-03-01", "method": "CASH"}"#;
        assert!(serde_json::from_str::<TransactionRequest>(non_positive).is_err());

        let unknown_type = r#"{"amount": 5, "type": "REFUND", "date": "2024-03-01", "method": "CASH"}"#;
        assert!(serde_json::from_str::<TransactionRequest>(unknown_type).is_err());

        let bad_date = r#"{"amount": 5, "type": "CREDIT", "date": "yesterday", "method": "CASH"}"#;
        assert!(serde_json::from_str::<TransactionRequest>(bad_date).is_err());

        let precise = r#"{"amount": "1.005", "type": "CREDIT", "date": "2024-03-01", "method": "CASH"}"#;
        assert!(serde_json::from_str::<TransactionRequest>(precise).is_err());
    }

    #[test]
    fn test_create_loan_request_deserialize() {
        let json = r#"{
            "title": "Car",
            "initialBalance": 100,
            "type": "BORROW",
            "transactionDetails": { "date": "2024-01-15", "method": "CASH" }
        }"#;

        let request: CreateLoanRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.loan_type, LoanType::Borrow);
        assert_eq!(request.initial_balance.value(), dec!(100));
        assert!(request.description.is_none());
    }

    #[test]
    fn test_envelope_shape() {
        let Json(body) = ApiResponse::with_message("done", 7);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "done");
        assert_eq!(json["data"], 7);

        let Json(body) = ApiResponse::ok(());
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("message").is_none());
    }

    /// Router with an authenticated reader attached and a pool that never
    /// connects; rejected requests must not reach the database.
    fn offline_router() -> Router {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let api_key = AuthenticatedApiKey {
            id: Uuid::new_v4(),
            name: "reader".to_string(),
            permissions: vec![permissions::READ_LOANS.to_string()],
        };
        create_router()
            .layer(Extension(OperationContext::for_user(Uuid::new_v4())))
            .layer(Extension(api_key))
            .with_state(pool)
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let request = axum::http::Request::builder()
            .uri(uri)
            .body(axum::body::Body::empty())
            .unwrap();
        let response = offline_router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_malformed_transaction_id_uses_error_envelope() {
        let (status, json) = get_json("/loans/Car/transactions/not-a-uuid").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["kind"], "invalid_input");
        assert_eq!(json["error_code"], "invalid_request");
    }

    #[tokio::test]
    async fn test_unknown_status_filter_uses_error_envelope() {
        let (status, json) = get_json("/loans?status=PAUSED").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["kind"], "invalid_input");
        assert!(json["details"].as_str().unwrap().contains("PAUSED"));
    }

    #[tokio::test]
    async fn test_malformed_repair_loan_id_uses_error_envelope() {
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/admin/reconciliation/42/repair")
            .body(axum::body::Body::empty())
            .unwrap();
        let response = offline_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
