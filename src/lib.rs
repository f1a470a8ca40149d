//! Shelfkeeper
//!
//! Back office for a book rental library: accounts, catalog, rentals and
//! late fees behind a REST JSON API. Every protected call goes through the
//! bearer-token ledger, and every multi-entity mutation runs in a single
//! coordinated transaction.

use std::sync::Arc;

pub mod api;
pub mod clock;
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
    pub services: Arc<services::Services<repository::PgStore>>,
}
