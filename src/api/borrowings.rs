//! Borrowing lifecycle endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::AppResult,
    models::{
        borrowing::{
            BorrowingDetails, BorrowingQuery, CreateBorrowingRequest, ReturnBorrowingRequest,
        },
        payment::Payment,
    },
};

use super::AuthenticatedUser;

/// Checkout session identifier passed back on success/cancel redirects
#[derive(Deserialize, IntoParams)]
pub struct SessionQuery {
    pub session_id: String,
}

/// Cancellation acknowledgement
#[derive(Serialize, ToSchema)]
pub struct CancelResponse {
    pub message: String,
}

/// List borrowings
#[utoipa::path(
    get,
    path = "/borrowings",
    tag = "borrowings",
    security(("bearer_auth" = [])),
    params(BorrowingQuery),
    responses(
        (status = 200, description = "Borrowings visible to the caller", body = Vec<BorrowingDetails>),
        (status = 400, description = "Invalid filter value")
    )
)]
pub async fn list_borrowings(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<BorrowingQuery>,
) -> AppResult<Json<Vec<BorrowingDetails>>> {
    let borrowings = state
        .services
        .borrowings
        .list_borrowings(&claims, &query)
        .await?;
    Ok(Json(borrowings))
}

/// Get a borrowing with its book and payment history
#[utoipa::path(
    get,
    path = "/borrowings/{id}",
    tag = "borrowings",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrowing ID")
    ),
    responses(
        (status = 200, description = "Borrowing details", body = BorrowingDetails),
        (status = 404, description = "Borrowing not found")
    )
)]
pub async fn get_borrowing(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(borrowing_id): Path<i32>,
) -> AppResult<Json<BorrowingDetails>> {
    let borrowing = state
        .services
        .borrowings
        .get_borrowing(&claims, borrowing_id)
        .await?;
    Ok(Json(borrowing))
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/borrowings",
    tag = "borrowings",
    security(("bearer_auth" = [])),
    request_body = CreateBorrowingRequest,
    responses(
        (status = 201, description = "Borrowing created", body = BorrowingDetails),
        (status = 400, description = "Invalid dates, unpaid payments or no copies available"),
        (status = 404, description = "Book not found"),
        (status = 502, description = "Checkout provider unavailable")
    )
)]
pub async fn create_borrowing(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateBorrowingRequest>,
) -> AppResult<(StatusCode, Json<BorrowingDetails>)> {
    let borrowing = state
        .services
        .borrowings
        .create_borrowing(&claims, request)
        .await?;
    Ok((StatusCode::CREATED, Json(borrowing)))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/borrowings/{id}/return",
    tag = "borrowings",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrowing ID")
    ),
    request_body = ReturnBorrowingRequest,
    responses(
        (status = 200, description = "Borrowing closed, fine assessed when late", body = BorrowingDetails),
        (status = 400, description = "Already returned or invalid return date"),
        (status = 404, description = "Borrowing not found"),
        (status = 502, description = "Checkout provider unavailable")
    )
)]
pub async fn return_borrowing(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(borrowing_id): Path<i32>,
    Json(request): Json<ReturnBorrowingRequest>,
) -> AppResult<Json<BorrowingDetails>> {
    let borrowing = state
        .services
        .borrowings
        .return_borrowing(&claims, borrowing_id, request)
        .await?;
    Ok(Json(borrowing))
}

/// Settle the payment after a completed checkout
#[utoipa::path(
    get,
    path = "/borrowings/{id}/success",
    tag = "borrowings",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrowing ID"),
        SessionQuery
    ),
    responses(
        (status = 200, description = "Payment settled", body = Payment),
        (status = 400, description = "Checkout not completed yet"),
        (status = 404, description = "Borrowing or payment not found"),
        (status = 502, description = "Checkout provider unavailable")
    )
)]
pub async fn payment_success(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(borrowing_id): Path<i32>,
    Query(query): Query<SessionQuery>,
) -> AppResult<Json<Payment>> {
    let payment = state
        .services
        .payments
        .settle(&claims, borrowing_id, &query.session_id)
        .await?;
    Ok(Json(payment))
}

/// Acknowledge a cancelled checkout
#[utoipa::path(
    get,
    path = "/borrowings/{id}/cancel",
    tag = "borrowings",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrowing ID"),
        SessionQuery
    ),
    responses(
        (status = 200, description = "Nothing changed, session stays open", body = CancelResponse),
        (status = 404, description = "Borrowing or payment not found")
    )
)]
pub async fn payment_cancelled(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(borrowing_id): Path<i32>,
    Query(query): Query<SessionQuery>,
) -> AppResult<Json<CancelResponse>> {
    let message = state
        .services
        .payments
        .cancelled(&claims, borrowing_id, &query.session_id)
        .await?;
    Ok(Json(CancelResponse { message }))
}
