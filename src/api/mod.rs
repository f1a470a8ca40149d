//! API handlers for Shelfkeeper REST endpoints

pub mod auth;
pub mod books;
pub mod health;
pub mod openapi;
pub mod rentals;
pub mod users;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    error::{AppError, AppResult, AuthError},
    models::{Principal, TokenType},
    AppState,
};

/// Raw bearer token from the Authorization header, not yet validated
pub struct BearerToken(pub String);

/// Principal behind a valid access token
pub struct AuthenticatedUser(pub Principal);

fn bearer_token(parts: &Parts) -> AppResult<&str> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AuthError::InvalidCredential)?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::InvalidCredential.into())
}

#[async_trait]
impl FromRequestParts<AppState> for BearerToken {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(BearerToken(bearer_token(parts)?.to_string()))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        let principal = state
            .services
            .session
            .authenticate(token, TokenType::Access)
            .await?;

        Ok(AuthenticatedUser(principal))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authentication
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/logout-all", post(auth::logout_all))
        .route("/auth/me", get(auth::me))
        // Users
        .route("/users", post(users::create_user))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id", delete(users::delete_user))
        .route("/users/:id/rentals", get(users::get_user_rentals))
        // Books
        .route("/books", get(books::list_books))
        .route("/books", post(books::create_book))
        .route("/books/:id", get(books::get_book))
        .route("/books/:id", put(books::update_book))
        .route("/books/:id/transfer", post(books::transfer_book))
        // Rentals
        .route("/rentals", post(rentals::create_rental))
        .route("/rentals/overdue", get(rentals::list_overdue))
        .route("/rentals/:id", get(rentals::get_rental))
        .route("/rentals/:id", delete(rentals::delete_rental))
        .route("/rentals/:id/return", post(rentals::return_rental))
        .route("/rentals/:id/extend", post(rentals::extend_rental))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}
