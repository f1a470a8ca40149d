//! Authentication endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{token::TokenPair, user::CreateUser, User},
    AppState,
};

use super::{AuthenticatedUser, BearerToken};

/// Login request
#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    /// User login
    pub login: String,
    /// User password
    pub password: String,
}

/// Optional body of a logout request
#[derive(Deserialize, ToSchema)]
pub struct LogoutRequest {
    /// Refresh token to revoke along with the access token
    pub refresh_token: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct LogoutAllResponse {
    /// Number of tokens revoked
    pub revoked: u64,
}

/// Register a new reader account
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = CreateUser,
    responses(
        (status = 201, description = "Account created", body = User),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Login or email already exists")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<CreateUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = state.services.users.register(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Authenticate with login and password
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenPair),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<TokenPair>> {
    let pair = state
        .services
        .auth
        .login(&request.login, &request.password)
        .await?;
    Ok(Json(pair))
}

/// Rotate a refresh token (sent as the bearer token)
#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Refresh token invalid, revoked or expired")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> AppResult<Json<TokenPair>> {
    let pair = state.services.auth.refresh(&token).await?;
    Ok(Json(pair))
}

/// Revoke the current access token, and optionally a refresh token
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    security(("bearer_auth" = [])),
    request_body = LogoutRequest,
    responses(
        (status = 204, description = "Logged out"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    body: Option<Json<LogoutRequest>>,
) -> AppResult<StatusCode> {
    let refresh_token = body.and_then(|Json(request)| request.refresh_token);
    state.services.auth.logout(&token, refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Revoke every token of the current user
#[utoipa::path(
    post,
    path = "/auth/logout-all",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All sessions revoked", body = LogoutAllResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn logout_all(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> AppResult<Json<LogoutAllResponse>> {
    let revoked = state.services.auth.logout_all(&principal).await?;
    Ok(Json(LogoutAllResponse { revoked }))
}

/// Get current user info
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user info", body = User),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> AppResult<Json<User>> {
    let user = state.services.users.get(principal.user_id).await?;
    Ok(Json(user))
}
