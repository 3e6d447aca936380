//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{borrowings, health, payments};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Libretto API",
        version = "1.0.0",
        description = "Library Rental Service REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html"),
        contact(name = "Libretto Team")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Borrowings
        borrowings::list_borrowings,
        borrowings::get_borrowing,
        borrowings::create_borrowing,
        borrowings::return_borrowing,
        borrowings::payment_success,
        borrowings::payment_cancelled,
        // Payments
        payments::list_payments,
        payments::get_payment,
        payments::renew_payment,
    ),
    components(
        schemas(
            // Books
            crate::models::book::Book,
            crate::models::book::CoverType,
            // Borrowings
            crate::models::borrowing::Borrowing,
            crate::models::borrowing::BorrowingDetails,
            crate::models::borrowing::CreateBorrowingRequest,
            crate::models::borrowing::ReturnBorrowingRequest,
            // Payments
            crate::models::payment::Payment,
            crate::models::payment::PaymentStatus,
            crate::models::payment::PaymentKind,
            borrowings::CancelResponse,
            // Users
            crate::models::user::User,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "borrowings", description = "Borrowing lifecycle"),
        (name = "payments", description = "Payments and fines")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
