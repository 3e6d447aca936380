//! Payment endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{error::AppResult, models::payment::Payment};

use super::AuthenticatedUser;

/// List payments
#[utoipa::path(
    get,
    path = "/payments",
    tag = "payments",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Payments visible to the caller", body = Vec<Payment>)
    )
)]
pub async fn list_payments(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Payment>>> {
    let payments = state.services.payments.list_payments(&claims).await?;
    Ok(Json(payments))
}

/// Get a payment
#[utoipa::path(
    get,
    path = "/payments/{id}",
    tag = "payments",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Payment ID")
    ),
    responses(
        (status = 200, description = "Payment details", body = Payment),
        (status = 404, description = "Payment not found")
    )
)]
pub async fn get_payment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(payment_id): Path<i32>,
) -> AppResult<Json<Payment>> {
    let payment = state
        .services
        .payments
        .get_payment(&claims, payment_id)
        .await?;
    Ok(Json(payment))
}

/// Renew the checkout session of an expired payment
#[utoipa::path(
    post,
    path = "/payments/{id}/renew",
    tag = "payments",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Payment ID")
    ),
    responses(
        (status = 200, description = "Payment back to pending with a fresh session", body = Payment),
        (status = 400, description = "Payment is not expired"),
        (status = 404, description = "Payment not found"),
        (status = 502, description = "Checkout provider unavailable")
    )
)]
pub async fn renew_payment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(payment_id): Path<i32>,
) -> AppResult<Json<Payment>> {
    let payment = state.services.payments.renew(&claims, payment_id).await?;
    Ok(Json(payment))
}
