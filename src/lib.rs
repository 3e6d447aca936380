//! Libretto Library Rental Service
//!
//! A Rust implementation of the Libretto book rental backend, providing
//! a REST JSON API for borrowings, payments and fines with online
//! checkout settlement.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
