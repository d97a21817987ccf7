//! API Integration Tests
//!
//! Run with: cargo test --features integration_tests

#![cfg(feature = "integration_tests")]

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use uuid::Uuid;

use loan_ledger::build_router;

mod common;

use common::{send, ADMIN_KEY, API_KEY, READ_ONLY_KEY};

fn request(method: &str, uri: &str, key: &str, user_id: Option<Uuid>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("X-API-Key", key);
    if let Some(user_id) = user_id {
        builder = builder.header("X-Request-User-Id", user_id.to_string());
    }
    let body = match body {
        Some(value) => Body::from(value.to_string()),
        None => Body::empty(),
    };
    builder.body(body).unwrap()
}

async fn register(app: &axum::Router) -> Uuid {
    let user_id = Uuid::new_v4();
    let (status, json) = send(
        app,
        request(
            "POST",
            "/api/v1/users",
            API_KEY,
            None,
            Some(json!({
                "id": user_id,
                "name": "Api User",
                "email": format!("{}@example.com", user_id),
                "currency": "eur"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "user creation failed: {}", json);
    assert_eq!(json["data"]["currency"], "EUR");
    user_id
}

#[tokio::test]
async fn test_loan_lifecycle_e2e() {
    let pool = common::setup_test_db().await;
    let app = build_router(pool.clone());
    let user = register(&app).await;

    // 1. Open a loan
    let (status, json) = send(
        &app,
        request(
            "POST",
            "/api/v1/loans",
            API_KEY,
            Some(user),
            Some(json!({
                "title": "Car",
                "description": "Money for the car",
                "initialBalance": 100,
                "type": "BORROW",
                "transactionDetails": { "date": "2024-01-15", "method": "BANK_TRANSFER" }
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", json);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["title"], "Car");
    assert_eq!(json["data"]["loan"]["balance"], "-100.00");
    assert_eq!(json["data"]["transaction"]["type"], "DEBIT");

    // 2. Repay part of it
    let (status, json) = send(
        &app,
        request(
            "POST",
            "/api/v1/loans/Car/transactions",
            API_KEY,
            Some(user),
            Some(json!({
                "amount": "40.00",
                "type": "CREDIT",
                "date": "2024-02-01T10:00:00Z",
                "method": "CASH"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", json);
    assert_eq!(json["data"]["loan"]["balance"], "-60.00");
    let transaction_id = json["data"]["transaction"]["id"].as_str().unwrap().to_string();

    // 3. Edit the repayment
    let (status, json) = send(
        &app,
        request(
            "PATCH",
            &format!("/api/v1/loans/Car/transactions/{}", transaction_id),
            API_KEY,
            Some(user),
            Some(json!({
                "amount": 25,
                "type": "CREDIT",
                "date": "2024-02-01",
                "method": "MOBILE_BANKING",
                "transactionId": "ref-77"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", json);
    assert_eq!(json["data"]["loan"]["balance"], "-75.00");
    assert_eq!(json["data"]["transaction"]["transactionId"], "ref-77");

    // 4. Read it back
    let (status, json) = send(
        &app,
        request("GET", "/api/v1/loans/Car", READ_ONLY_KEY, Some(user), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["transactions"].as_array().unwrap().len(), 2);
    assert_eq!(json["data"]["description"], "Money for the car");

    // 5. Delete the repayment
    let (status, json) = send(
        &app,
        request(
            "DELETE",
            &format!("/api/v1/loans/Car/transactions/{}", transaction_id),
            API_KEY,
            Some(user),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["loan"]["balance"], "-100.00");

    // 6. The listing carries the latest transaction
    let (status, json) = send(
        &app,
        request("GET", "/api/v1/loans?status=RUNNING", API_KEY, Some(user), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let loans = json["data"].as_array().unwrap();
    assert_eq!(loans.len(), 1);
    assert_eq!(loans[0]["latestTransaction"]["type"], "DEBIT");

    // 7. Delete the loan
    let (status, _) = send(
        &app,
        request("DELETE", "/api/v1/loans/Car", API_KEY, Some(user), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(
        &app,
        request("GET", "/api/v1/loans/Car", API_KEY, Some(user), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["kind"], "not_found");
}

#[tokio::test]
async fn test_invalid_input_writes_nothing() {
    let pool = common::setup_test_db().await;
    let app = build_router(pool.clone());
    let user = register(&app).await;

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/v1/loans",
            API_KEY,
            Some(user),
            Some(json!({
                "title": "Phone",
                "initialBalance": 10,
                "type": "LEND",
                "transactionDetails": { "date": "2024-01-15", "method": "CASH" }
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let bad_bodies = [
        json!({ "amount": -5, "type": "CREDIT", "date": "2024-01-15", "method": "CASH" }),
        json!({ "amount": 5, "type": "GIFT", "date": "2024-01-15", "method": "CASH" }),
        json!({ "amount": 5, "type": "CREDIT", "date": "someday", "method": "CASH" }),
        json!({ "amount": "5.001", "type": "CREDIT", "date": "2024-01-15", "method": "CASH" }),
    ];

    for body in bad_bodies {
        let (status, json) = send(
            &app,
            request("POST", "/api/v1/loans/Phone/transactions", API_KEY, Some(user), Some(body)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", json);
        assert_eq!(json["kind"], "invalid_input");
    }

    let (_, json) = send(
        &app,
        request("GET", "/api/v1/loans/Phone", API_KEY, Some(user), None),
    )
    .await;
    assert_eq!(json["data"]["balance"], "10.00");
    assert_eq!(json["data"]["transactions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_duplicate_title_conflict() {
    let pool = common::setup_test_db().await;
    let app = build_router(pool.clone());
    let user = register(&app).await;

    let body = json!({
        "title": "Twice",
        "initialBalance": "12.50",
        "type": "LEND",
        "transactionDetails": { "date": "2024-01-15", "method": "CHECK" }
    });

    let (status, _) = send(
        &app,
        request("POST", "/api/v1/loans", API_KEY, Some(user), Some(body.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = send(
        &app,
        request("POST", "/api/v1/loans", API_KEY, Some(user), Some(body)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["kind"], "duplicate_title");
}

#[tokio::test]
async fn test_authentication_and_permissions() {
    let pool = common::setup_test_db().await;
    let app = build_router(pool.clone());
    let user = register(&app).await;

    let (status, _) = send(
        &app,
        request("GET", "/api/v1/loans", "not-a-key", Some(user), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = send(
        &app,
        request(
            "POST",
            "/api/v1/loans/Anything/transactions",
            READ_ONLY_KEY,
            Some(user),
            Some(json!({ "amount": 5, "type": "CREDIT", "date": "2024-01-15", "method": "CASH" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["kind"], "unauthorized");

    let (status, json) = send(&app, request("GET", "/api/v1/loans", API_KEY, None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_code"], "missing_header");

    let (status, _) = send(
        &app,
        request("GET", "/api/v1/admin/reconciliation", API_KEY, None, None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = send(
        &app,
        request("GET", "/api/v1/admin/reconciliation", ADMIN_KEY, None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["data"]["drifted"].is_array());
}

#[tokio::test]
async fn test_profile_and_health() {
    let pool = common::setup_test_db().await;
    let app = build_router(pool.clone());
    let user = register(&app).await;

    let (status, json) = send(
        &app,
        request(
            "PATCH",
            "/api/v1/profile",
            API_KEY,
            Some(user),
            Some(json!({ "name": "Renamed", "currency": "GBP" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", json);

    let (status, json) = send(&app, request("GET", "/api/v1/profile", API_KEY, Some(user), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["name"], "Renamed");
    assert_eq!(json["data"]["currency"], "GBP");

    let response = send(
        &app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.0, StatusCode::OK);
    assert_eq!(response.1["database"], "up");
}

#[tokio::test]
async fn test_loan_titled_recent_is_addressable() {
    let pool = common::setup_test_db().await;
    let app = build_router(pool.clone());
    let user = register(&app).await;

    let (status, json) = send(
        &app,
        request(
            "POST",
            "/api/v1/loans",
            API_KEY,
            Some(user),
            Some(json!({
                "title": "recent",
                "initialBalance": 30,
                "type": "LEND",
                "transactionDetails": { "date": "2024-03-01", "method": "CASH" }
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", json);

    let (status, json) = send(
        &app,
        request("GET", "/api/v1/loans/recent", API_KEY, Some(user), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", json);
    assert_eq!(json["data"]["title"], "recent");
    assert_eq!(json["data"]["balance"], "30.00");

    let (status, json) = send(
        &app,
        request(
            "PATCH",
            "/api/v1/loans/recent",
            API_KEY,
            Some(user),
            Some(json!({ "description": "named like a route" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", json);

    let (status, json) = send(
        &app,
        request("GET", "/api/v1/recent-loans", API_KEY, Some(user), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", json);
    let recent = json["data"].as_array().unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0]["title"], "recent");

    let (status, _) = send(
        &app,
        request("DELETE", "/api/v1/loans/recent", API_KEY, Some(user), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
