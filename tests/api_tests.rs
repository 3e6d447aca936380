//! API integration tests
//!
//! These run against a live server with a freshly seeded database: a
//! book with id 1 and inventory of at least 4, a staff user with id 1,
//! regular members with ids 2 through 4, and one payment seeded in
//! EXPIRED status. Each borrowing leaves a pending payment behind,
//! which blocks that user's next borrowing, so every test that creates
//! one uses its own user.

use chrono::{Duration, Utc};
use reqwest::Client;
use serde_json::{json, Value};

use libretto_server::models::user::UserClaims;

const BASE_URL: &str = "http://localhost:8080/api/v1";

fn jwt_secret() -> String {
    std::env::var("JWT_SECRET").unwrap_or_else(|_| "change-this-secret-in-production".to_string())
}

/// Mint a token the way the out-of-band identity provider would
fn auth_token(user_id: i32, email: &str, is_staff: bool) -> String {
    let now = Utc::now().timestamp();
    let claims = UserClaims {
        sub: email.to_string(),
        user_id,
        is_staff,
        exp: now + 3600,
        iat: now,
    };
    claims
        .create_token(&jwt_secret())
        .expect("Failed to create token")
}

fn staff_token() -> String {
    auth_token(1, "admin@libretto.test", true)
}

fn member_token() -> String {
    auth_token(2, "reader@libretto.test", false)
}

/// Decimal fields serialize as strings ("1.50")
fn decimal_field(value: &Value) -> f64 {
    value
        .as_str()
        .map(|s| s.parse().expect("malformed decimal"))
        .or_else(|| value.as_f64())
        .expect("not a decimal field")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_unauthorized_access() {
    let client = Client::new();

    let response = client
        .get(format!("{}/borrowings", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_list_borrowings() {
    let client = Client::new();

    let response = client
        .get(format!("{}/borrowings", BASE_URL))
        .header("Authorization", format!("Bearer {}", staff_token()))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body.is_array());
}

#[tokio::test]
#[ignore]
async fn test_invalid_is_active_filter() {
    let client = Client::new();

    let response = client
        .get(format!("{}/borrowings?is_active=yes", BASE_URL))
        .header("Authorization", format!("Bearer {}", staff_token()))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore]
async fn test_borrow_and_return_flow() {
    let client = Client::new();
    let token = member_token();

    let today = Utc::now().date_naive();
    let expected = today + Duration::days(3);

    // Borrow
    let response = client
        .post(format!("{}/borrowings", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({
            "book_id": 1,
            "borrow_date": today.to_string(),
            "expected_return_date": expected.to_string(),
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.expect("Failed to parse response");
    let borrowing_id = body["id"].as_i64().expect("No borrowing ID");
    assert_eq!(body["is_active"], true);
    assert_eq!(body["payments"][0]["type"], "PAYMENT");
    assert_eq!(body["payments"][0]["status"], "PENDING");

    // Return on time
    let response = client
        .post(format!("{}/borrowings/{}/return", BASE_URL, borrowing_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({ "actual_return_date": expected.to_string() }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["is_active"], false);
    // Returned on the expected date, so no fine was assessed
    assert_eq!(body["payments"].as_array().map(Vec::len), Some(1));

    // Returning again is rejected
    let response = client
        .post(format!("{}/borrowings/{}/return", BASE_URL, borrowing_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({ "actual_return_date": expected.to_string() }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore]
async fn test_late_return_assesses_fine() {
    let client = Client::new();
    let token = auth_token(4, "reader3@libretto.test", false);

    let today = Utc::now().date_naive();

    // Borrowed a week ago, due yesterday
    let response = client
        .post(format!("{}/borrowings", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({
            "book_id": 1,
            "borrow_date": (today - Duration::days(7)).to_string(),
            "expected_return_date": (today - Duration::days(1)).to_string(),
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.expect("Failed to parse response");
    let borrowing_id = body["id"].as_i64().expect("No borrowing ID");

    // Returning today is one day late
    let response = client
        .post(format!("{}/borrowings/{}/return", BASE_URL, borrowing_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({ "actual_return_date": today.to_string() }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.expect("Failed to parse response");
    let payments = body["payments"].as_array().expect("No payments array");
    assert_eq!(payments.len(), 2);
    assert_eq!(payments[1]["type"], "FINE");
    assert_eq!(payments[1]["status"], "PENDING");

    // One day late at twice the daily fee
    let daily_fee = decimal_field(&body["book"]["daily_fee"]);
    let fine = decimal_field(&payments[1]["to_pay"]);
    assert!((fine - daily_fee * 2.0).abs() < 1e-9);
}

#[tokio::test]
#[ignore]
async fn test_create_borrowing_with_reversed_dates() {
    let client = Client::new();

    let today = Utc::now().date_naive();

    let response = client
        .post(format!("{}/borrowings", BASE_URL))
        .header("Authorization", format!("Bearer {}", staff_token()))
        .json(&json!({
            "book_id": 1,
            "borrow_date": today.to_string(),
            "expected_return_date": (today - Duration::days(1)).to_string(),
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore]
async fn test_member_cannot_see_foreign_borrowing() {
    let client = Client::new();

    let today = Utc::now().date_naive();

    // Staff creates a borrowing of their own
    let response = client
        .post(format!("{}/borrowings", BASE_URL))
        .header("Authorization", format!("Bearer {}", staff_token()))
        .json(&json!({
            "book_id": 1,
            "borrow_date": today.to_string(),
            "expected_return_date": (today + Duration::days(2)).to_string(),
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.expect("Failed to parse response");
    let borrowing_id = body["id"].as_i64().expect("No borrowing ID");

    // The member sees it as absent, not forbidden
    let response = client
        .get(format!("{}/borrowings/{}", BASE_URL, borrowing_id))
        .header("Authorization", format!("Bearer {}", member_token()))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 404);
}

#[tokio::test]
#[ignore]
async fn test_list_payments() {
    let client = Client::new();

    let response = client
        .get(format!("{}/payments", BASE_URL))
        .header("Authorization", format!("Bearer {}", staff_token()))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body.is_array());
}

#[tokio::test]
#[ignore]
async fn test_get_missing_payment() {
    let client = Client::new();

    let response = client
        .get(format!("{}/payments/999999", BASE_URL))
        .header("Authorization", format!("Bearer {}", staff_token()))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 404);
}

#[tokio::test]
#[ignore]
async fn test_unknown_borrower_cannot_create_borrowing() {
    let client = Client::new();
    // A token for an account that was since deleted
    let token = auth_token(999_999, "ghost@libretto.test", false);

    let today = Utc::now().date_naive();
    let response = client
        .post(format!("{}/borrowings", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({
            "book_id": 1,
            "borrow_date": today.to_string(),
            "expected_return_date": (today + Duration::days(1)).to_string(),
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 404);
}

#[tokio::test]
#[ignore]
async fn test_renew_expired_payment_goes_back_to_pending() {
    let client = Client::new();
    let token = staff_token();

    let response = client
        .get(format!("{}/payments", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    let expired = body
        .as_array()
        .expect("No payments array")
        .iter()
        .find(|p| p["status"] == "EXPIRED")
        .expect("Seed data contains an expired payment")
        .clone();
    let payment_id = expired["id"].as_i64().expect("No payment ID");

    let response = client
        .post(format!("{}/payments/{}/renew", BASE_URL, payment_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "PENDING");
    if !expired["session_id"].is_null() {
        assert_ne!(body["session_id"], expired["session_id"]);
    }
}

#[tokio::test]
#[ignore]
async fn test_renew_pending_payment_is_rejected() {
    let client = Client::new();
    let token = auth_token(3, "reader2@libretto.test", false);

    // Any fresh borrowing carries a PENDING payment
    let today = Utc::now().date_naive();
    let response = client
        .post(format!("{}/borrowings", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({
            "book_id": 1,
            "borrow_date": today.to_string(),
            "expected_return_date": (today + Duration::days(1)).to_string(),
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.expect("Failed to parse response");
    let payment_id = body["payments"][0]["id"].as_i64().expect("No payment ID");

    let response = client
        .post(format!("{}/payments/{}/renew", BASE_URL, payment_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
}
