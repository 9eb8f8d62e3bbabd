//! API Integration Tests

use std::str::FromStr;

use axum::http::StatusCode;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

mod common;

use common::send;

fn decimal(value: &Value) -> Decimal {
    Decimal::from_str(value.as_str().unwrap_or("NaN")).unwrap()
}

fn deposit(amount: &str) -> Value {
    json!({
        "type": "DEPOSIT",
        "amount": amount,
        "currency": "USD",
        "accountType": "checkingAccount"
    })
}

// =========================================================================
// Without a database
// =========================================================================

#[tokio::test]
async fn test_health_check() {
    let app = common::offline_app();
    let response = tower::util::ServiceExt::oneshot(
        app,
        axum::http::Request::builder()
            .uri("/health")
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_protected_routes_require_bearer_session() {
    let app = common::offline_app();

    let (status, body) = send(&app, "GET", "/api/v1/transactions", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["statusCode"], 401);
    assert_eq!(body["errorCode"], "unauthorized");

    let request = axum::http::Request::builder()
        .uri("/api/v1/users/me")
        .header("authorization", "Basic dXNlcjpwdw==")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::util::ServiceExt::oneshot(app, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_rejects_invalid_email_before_touching_storage() {
    let app = common::offline_app();
    let mut body = common::registration("bad_email");
    body["email"] = json!("not-an-email");

    let (status, body) = send(&app, "POST", "/api/v1/auth/register", None, Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "validation_error");
}

#[tokio::test]
async fn test_malformed_body_is_a_json_validation_error() {
    let app = common::offline_app();
    let mut body = common::registration("bad_date");
    body["dateOfBirth"] = json!("not-a-date");

    let (status, body) = send(&app, "POST", "/api/v1/auth/register", None, Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["statusCode"], 400);
    assert_eq!(body["errorCode"], "validation_error");
    assert!(body["message"].as_str().unwrap().contains("dateOfBirth"));

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/v1/auth/login")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{\"accountNumber\":"))
        .unwrap();
    let response = tower::util::ServiceExt::oneshot(app, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = common::offline_app();
    let response = tower::util::ServiceExt::oneshot(
        app.clone(),
        axum::http::Request::builder()
            .uri("/health")
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();
    assert!(response.headers().contains_key("x-request-id"));

    let response = tower::util::ServiceExt::oneshot(
        app,
        axum::http::Request::builder()
            .uri("/health")
            .header("x-request-id", "req-42")
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-42");
}

#[tokio::test]
async fn test_cors_preflight_allows_frontend_origin() {
    let app = common::offline_app();
    let request = axum::http::Request::builder()
        .method("OPTIONS")
        .uri("/api/v1/auth/login")
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "POST")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::util::ServiceExt::oneshot(app, request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:3000"
    );
}

// =========================================================================
// Against Postgres
// =========================================================================

#[tokio::test]
#[ignore = "requires a migrated Postgres at DATABASE_URL"]
async fn test_register_login_and_deposit_withdraw() {
    let (app, _pool, mailer) = common::test_app().await;
    let (_, account_number) = common::register(&app, "alice").await;
    let token = common::login(&app, &mailer, "alice", &account_number).await;

    let (status, body) = send(&app, "POST", "/api/v1/transactions", Some(&token), Some(deposit("200"))).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["transaction"]["status"], "Completed");

    let withdrawal = json!({
        "type": "WITHDRAWAL",
        "amount": "20",
        "currency": "USD",
        "accountType": "checkingAccount"
    });
    let (status, _) = send(&app, "POST", "/api/v1/transactions", Some(&token), Some(withdrawal)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "GET", "/api/v1/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["user"]["checkingAccount"]["balance"]), dec!(180));

    // Overdraft leaves the balance untouched
    let overdraft = json!({
        "type": "WITHDRAWAL",
        "amount": "1000",
        "currency": "USD",
        "accountType": "checkingAccount"
    });
    let (status, body) = send(&app, "POST", "/api/v1/transactions", Some(&token), Some(overdraft)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"], "insufficient_balance");

    let (_, body) = send(&app, "GET", "/api/v1/transactions", Some(&token), None).await;
    assert_eq!(body["transactions"].as_array().unwrap().len(), 2);

    let (status, _) = send(&app, "POST", "/api/v1/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", "/api/v1/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires a migrated Postgres at DATABASE_URL"]
async fn test_internal_transfer_credits_recipient() {
    let (app, _pool, mailer) = common::test_app().await;
    let (_, alice_account) = common::register(&app, "alice").await;
    let (_, bob_account) = common::register(&app, "bob").await;
    let alice = common::login(&app, &mailer, "alice", &alice_account).await;
    let bob = common::login(&app, &mailer, "bob", &bob_account).await;

    send(&app, "POST", "/api/v1/transactions", Some(&alice), Some(deposit("100"))).await;

    let transfer = json!({
        "type": "TRANSFER",
        "amount": "40",
        "currency": "USD",
        "accountType": "checkingAccount",
        "transferDetails": { "accountNumber": bob_account }
    });
    let (status, body) = send(&app, "POST", "/api/v1/transactions", Some(&alice), Some(transfer)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    let (_, body) = send(&app, "GET", "/api/v1/users/me", Some(&alice), None).await;
    assert_eq!(decimal(&body["user"]["checkingAccount"]["balance"]), dec!(60));
    let (_, body) = send(&app, "GET", "/api/v1/users/me", Some(&bob), None).await;
    assert_eq!(decimal(&body["user"]["checkingAccount"]["balance"]), dec!(40));

    let (_, body) = send(&app, "GET", "/api/v1/notifications", Some(&bob), None).await;
    assert!(!body["notifications"].as_array().unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires a migrated Postgres at DATABASE_URL"]
async fn test_transfer_recipient_statement_matches_balance() {
    let (app, _pool, mailer) = common::test_app().await;
    let (_, alice_account) = common::register(&app, "alice").await;
    let (_, bob_account) = common::register(&app, "bob").await;
    let alice = common::login(&app, &mailer, "alice", &alice_account).await;
    let bob = common::login(&app, &mailer, "bob", &bob_account).await;

    send(&app, "POST", "/api/v1/transactions", Some(&alice), Some(deposit("100"))).await;
    let transfer = json!({
        "type": "TRANSFER",
        "amount": "40",
        "currency": "USD",
        "accountType": "checkingAccount",
        "transferDetails": { "accountNumber": bob_account }
    });
    let (status, body) = send(&app, "POST", "/api/v1/transactions", Some(&alice), Some(transfer)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["transaction"]["owner"]["accountNumber"], alice_account.as_str());
    assert_eq!(body["transaction"]["currencyDetails"]["name"], "USD");

    let (_, body) = send(&app, "GET", "/api/v1/transactions", Some(&bob), None).await;
    let entries = body["transactions"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["type"], "DEPOSIT");
    assert_eq!(entries[0]["recipient"], alice_account.as_str());

    let today = chrono::Utc::now().date_naive().to_string();
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/statements",
        Some(&bob),
        Some(json!({
            "accountType": "checkingAccount",
            "startDate": today,
            "endDate": today,
            "format": "csv"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    let uri = format!("/api/v1/statements/{}", body["statement"]["id"].as_str().unwrap());
    let (status, body) = send(&app, "GET", &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["statement"]["endingBalance"]), dec!(40));
}

#[tokio::test]
#[ignore = "requires a migrated Postgres at DATABASE_URL"]
async fn test_credit_limit_marker_cannot_be_posted_as_transaction() {
    let (app, _pool, mailer) = common::test_app().await;
    let (_, account_number) = common::register(&app, "mallory").await;
    let token = common::login(&app, &mailer, "mallory", &account_number).await;

    let payment = json!({
        "type": "PAYMENT",
        "paymentMethod": "CREDIT_LIMIT_INCREASE",
        "amount": "25000",
        "currency": "USD",
        "accountType": "loanAccount"
    });
    let (status, body) = send(&app, "POST", "/api/v1/transactions", Some(&token), Some(payment)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "validation_error");

    let (_, body) = send(&app, "GET", "/api/v1/users/me", Some(&token), None).await;
    assert_eq!(decimal(&body["user"]["loanAccount"]["creditLimit"]), Decimal::ZERO);
}

#[tokio::test]
#[ignore = "requires a migrated Postgres at DATABASE_URL"]
async fn test_credit_limit_requests_count_pending_against_ceiling() {
    let (app, pool, mailer) = common::test_app().await;
    let (_, account_number) = common::register(&app, "carol").await;
    let token = common::login(&app, &mailer, "carol", &account_number).await;

    // Regular tier, ceiling 25000
    sqlx::query("UPDATE users SET credit_limit = 20000 WHERE user_name = 'carol'")
        .execute(&pool)
        .await
        .unwrap();

    let request = |amount: &str| {
        json!({
            "requestedLimit": amount,
            "reason": "Home renovation"
        })
    };

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/transactions/credit-limit",
        Some(&token),
        Some(request("4000")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["transaction"]["status"], "Processing");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/transactions/credit-limit",
        Some(&token),
        Some(request("2000")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"], "credit_limit_exceeded");
}

#[tokio::test]
#[ignore = "requires a migrated Postgres at DATABASE_URL"]
async fn test_loan_payment_pays_off_loan() {
    let (app, pool, mailer) = common::test_app().await;
    let (user_id, account_number) = common::register(&app, "dave").await;
    let (_, admin_account) = common::register(&app, "admin").await;
    let admin = common::admin_login(&app, &pool, "admin", &admin_account).await;
    let token = common::login(&app, &mailer, "dave", &account_number).await;

    send(&app, "POST", "/api/v1/transactions", Some(&token), Some(deposit("800"))).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/admin/loans",
        Some(&admin),
        Some(json!({
            "userId": user_id,
            "loanType": "Personal",
            "amount": "500",
            "interestRate": "0",
            "termMonths": 10
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let loan_id = body["loan"]["id"].as_str().unwrap().to_string();

    let payment = json!({
        "type": "LOAN_PAYMENT",
        "amount": "500",
        "accountType": "checkingAccount"
    });
    let uri = format!("/api/v1/loans/{}/payment", loan_id);
    let (status, body) = send(&app, "POST", &uri, Some(&token), Some(payment.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["loan"]["status"], "paid");
    assert_eq!(decimal(&body["loan"]["currentBalance"]), Decimal::ZERO);

    let (_, body) = send(&app, "GET", "/api/v1/users/me", Some(&token), None).await;
    assert_eq!(decimal(&body["user"]["checkingAccount"]["balance"]), dec!(300));

    let (status, body) = send(&app, "POST", &uri, Some(&token), Some(payment)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"], "loan_already_paid");
}

#[tokio::test]
#[ignore = "requires a migrated Postgres at DATABASE_URL"]
async fn test_completed_transaction_cannot_be_deleted() {
    let (app, pool, mailer) = common::test_app().await;
    let (_, account_number) = common::register(&app, "erin").await;
    let (_, admin_account) = common::register(&app, "root").await;
    let admin = common::admin_login(&app, &pool, "root", &admin_account).await;
    let token = common::login(&app, &mailer, "erin", &account_number).await;

    let (_, body) = send(&app, "POST", "/api/v1/transactions", Some(&token), Some(deposit("50"))).await;
    let uri = format!("/api/v1/transactions/{}", body["transaction"]["id"].as_str().unwrap());

    let (status, _) = send(&app, "DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, "DELETE", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Notes stay editable
    let (status, body) = send(&app, "PATCH", &uri, Some(&token), Some(json!({"notes": "rent"}))).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["transaction"]["notes"], "rent");
}

#[tokio::test]
#[ignore = "requires a migrated Postgres at DATABASE_URL"]
async fn test_statement_replays_window_balances() {
    let (app, _pool, mailer) = common::test_app().await;
    let (_, account_number) = common::register(&app, "frank").await;
    let token = common::login(&app, &mailer, "frank", &account_number).await;

    send(&app, "POST", "/api/v1/transactions", Some(&token), Some(deposit("75"))).await;

    let today = chrono::Utc::now().date_naive().to_string();
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/statements",
        Some(&token),
        Some(json!({
            "accountType": "checkingAccount",
            "startDate": today,
            "endDate": today,
            "format": "pdf"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    let uri = format!("/api/v1/statements/{}", body["statement"]["id"].as_str().unwrap());
    let (status, body) = send(&app, "GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["statement"]["startingBalance"]), Decimal::ZERO);
    assert_eq!(decimal(&body["statement"]["endingBalance"]), dec!(75));
    assert_eq!(body["statement"]["currency"], "USD");
}
