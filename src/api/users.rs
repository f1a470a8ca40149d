//! User management endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        user::{CascadeReport, CreateUser},
        Rental, Role, User,
    },
    services::policy,
    AppState,
};

use super::AuthenticatedUser;

/// Create a user with any role (administrators only)
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Not an administrator"),
        (status = 409, description = "Login or email already exists")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Json(user): Json<CreateUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    policy::ensure(policy::require_role(&principal, Role::Admin), "create users")?;

    let created = state.services.users.create_user(user).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Get user details by ID (self or administrator)
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User details", body = User),
        (status = 403, description = "Not allowed"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<User>> {
    policy::ensure(policy::can_act_on_own_resource(&principal, id), "view this user")?;

    let user = state.services.users.get(id).await?;
    Ok(Json(user))
}

/// Delete a user with its books, rentals, payments and tokens
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User deleted", body = CascadeReport),
        (status = 403, description = "Not allowed"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Administrator account or active rentals")
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<CascadeReport>> {
    policy::ensure(policy::can_act_on_own_resource(&principal, id), "delete this user")?;

    let report = state.services.users.cascade_delete(id).await?;
    Ok(Json(report))
}

/// Get rentals of a user (self or staff)
#[utoipa::path(
    get,
    path = "/users/{id}/rentals",
    tag = "rentals",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Rentals of the user", body = Vec<Rental>),
        (status = 403, description = "Not allowed")
    )
)]
pub async fn get_user_rentals(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<Rental>>> {
    policy::ensure(
        policy::can_act_on_own_resource(&principal, id) || policy::can_manage_circulation(&principal),
        "view rentals of this user",
    )?;

    let rentals = state.services.rentals.list_for_user(id).await?;
    Ok(Json(rentals))
}
