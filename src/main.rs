//! Libretto Server - Library Rental Service
//!
//! A Rust REST API server for book rentals, payments and fines.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use libretto_server::{api, config::AppConfig, repository::Repository, services::Services, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().expect("Failed to load configuration");

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("libretto_server={},tower_http=debug", config.logging.level).into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Libretto Server v{}", env!("CARGO_PKG_VERSION"));

    // Create database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations completed");

    // Save server address before moving config
    let server_host = config.server.host.clone();
    let server_port = config.server.port;

    // Create repository and services
    let repository = Repository::new(pool);
    let services = Services::new(repository, &config.gateway, &config.notifier)
        .expect("Failed to create services");

    // Create application state
    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    // Periodic jobs: payment expiry sweep and overdue scan
    spawn_background_jobs(&state);

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(
        server_host.parse().expect("Invalid host address"),
        server_port,
    );

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Borrowings
        .route("/borrowings", get(api::borrowings::list_borrowings))
        .route("/borrowings", post(api::borrowings::create_borrowing))
        .route("/borrowings/:id", get(api::borrowings::get_borrowing))
        .route("/borrowings/:id/return", post(api::borrowings::return_borrowing))
        .route("/borrowings/:id/success", get(api::borrowings::payment_success))
        .route("/borrowings/:id/cancel", get(api::borrowings::payment_cancelled))
        // Payments
        .route("/payments", get(api::payments::list_payments))
        .route("/payments/:id", get(api::payments::get_payment))
        .route("/payments/:id/renew", post(api::payments::renew_payment))
        .with_state(state.clone());

    // OpenAPI documentation
    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Spawn the periodic background jobs. Each runs on its own interval;
/// failures are logged and the next tick tries again.
fn spawn_background_jobs(state: &AppState) {
    let payments = state.services.payments.clone();
    let payments_interval = Duration::from_secs(state.config.sweeps.payments_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(payments_interval);
        // The first tick fires immediately, skip it
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match payments.sweep_expired().await {
                Ok(0) => {}
                Ok(count) => tracing::info!(count, "expiry sweep closed checkout sessions"),
                Err(e) => tracing::error!(error = %e, "payment expiry sweep failed"),
            }
        }
    });

    let overdue = state.services.overdue.clone();
    let overdue_interval = Duration::from_secs(state.config.sweeps.overdue_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(overdue_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = overdue.scan_and_notify().await {
                tracing::error!(error = %e, "overdue scan failed");
            }
        }
    });
}
