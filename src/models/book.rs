//! Book (catalog entry) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Book model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub owner_id: i32,
    pub isbn: String,
    pub title: String,
    pub author: Option<String>,
    /// Copies not currently out on an active rental
    pub available_copies: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row to insert into `books`
#[derive(Debug, Clone)]
pub struct NewBook {
    pub owner_id: i32,
    pub isbn: String,
    pub title: String,
    pub author: Option<String>,
    pub available_copies: i32,
}

/// Column changes applied by an update; `available_copies` is deliberately
/// absent since only rentals move it.
#[derive(Debug, Clone)]
pub struct BookChanges {
    pub owner_id: i32,
    pub isbn: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 10, max = 17, message = "ISBN must be 10 to 17 characters"))]
    pub isbn: String,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    pub author: Option<String>,
    /// Number of copies (defaults to 1)
    #[validate(range(min = 1, max = 10000))]
    pub copies: Option<i32>,
    /// Owner (honored for administrators only)
    pub owner_id: Option<i32>,
}

/// Update book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 10, max = 17, message = "ISBN must be 10 to 17 characters"))]
    pub isbn: Option<String>,
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: Option<String>,
    pub author: Option<String>,
    /// Owner (honored for administrators only)
    pub owner_id: Option<i32>,
}

/// Ownership transfer request
#[derive(Debug, Deserialize, ToSchema)]
pub struct TransferBook {
    pub from_user_id: i32,
    pub to_user_id: i32,
}

/// Book listing filter
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    pub owner_id: Option<i32>,
    pub available_only: Option<bool>,
}
