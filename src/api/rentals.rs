//! Rental endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        rental::{CreateRental, ExtendRental, Rental, RentalReturn},
        Principal, Role,
    },
    services::policy,
    AppState,
};

use super::AuthenticatedUser;

/// Load a rental the principal may act on: its borrower or desk staff
async fn rental_for(
    state: &AppState,
    principal: &Principal,
    id: i32,
    action: &str,
) -> AppResult<Rental> {
    let rental = state.services.rentals.get(id).await?;
    policy::ensure(
        policy::can_act_on_own_resource(principal, rental.user_id)
            || policy::can_manage_circulation(principal),
        action,
    )?;
    Ok(rental)
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/rentals",
    tag = "rentals",
    security(("bearer_auth" = [])),
    request_body = CreateRental,
    responses(
        (status = 201, description = "Rental created", body = Rental),
        (status = 400, description = "Due date not in the future"),
        (status = 404, description = "User or book not found"),
        (status = 409, description = "No copy available")
    )
)]
pub async fn create_rental(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Json(request): Json<CreateRental>,
) -> AppResult<(StatusCode, Json<Rental>)> {
    let rentals = &state.services.rentals;
    let user_id = policy::resolve_borrower(&principal, request.user_id);
    let due_date = request
        .due_date
        .unwrap_or_else(|| rentals.default_due_date());

    let rental = rentals.create(user_id, request.book_id, due_date).await?;
    Ok((StatusCode::CREATED, Json(rental)))
}

/// List overdue rentals (staff only)
#[utoipa::path(
    get,
    path = "/rentals/overdue",
    tag = "rentals",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Overdue rentals", body = Vec<Rental>),
        (status = 403, description = "Not staff")
    )
)]
pub async fn list_overdue(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> AppResult<Json<Vec<Rental>>> {
    policy::ensure(policy::can_manage_circulation(&principal), "list overdue rentals")?;

    let rentals = state.services.rentals.list_overdue().await?;
    Ok(Json(rentals))
}

/// Get rental details
#[utoipa::path(
    get,
    path = "/rentals/{id}",
    tag = "rentals",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Rental ID")
    ),
    responses(
        (status = 200, description = "Rental details", body = Rental),
        (status = 403, description = "Not allowed"),
        (status = 404, description = "Rental not found")
    )
)]
pub async fn get_rental(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Rental>> {
    let rental = rental_for(&state, &principal, id, "view this rental").await?;
    Ok(Json(rental))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/rentals/{id}/return",
    tag = "rentals",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Rental ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = RentalReturn),
        (status = 404, description = "Rental not found"),
        (status = 409, description = "Rental already returned")
    )
)]
pub async fn return_rental(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<RentalReturn>> {
    rental_for(&state, &principal, id, "return this rental").await?;

    let returned = state.services.rentals.return_rental(id).await?;
    Ok(Json(returned))
}

/// Extend the due date of an active rental
#[utoipa::path(
    post,
    path = "/rentals/{id}/extend",
    tag = "rentals",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Rental ID")
    ),
    request_body = ExtendRental,
    responses(
        (status = 200, description = "Rental extended", body = Rental),
        (status = 400, description = "Invalid extension"),
        (status = 404, description = "Rental not found"),
        (status = 409, description = "Rental already returned")
    )
)]
pub async fn extend_rental(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<ExtendRental>,
) -> AppResult<Json<Rental>> {
    let by = request.extend_by()?;
    rental_for(&state, &principal, id, "extend this rental").await?;

    let rental = state.services.rentals.extend(id, by).await?;
    Ok(Json(rental))
}

/// Delete a rental record (administrators only)
#[utoipa::path(
    delete,
    path = "/rentals/{id}",
    tag = "rentals",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Rental ID")
    ),
    responses(
        (status = 204, description = "Rental deleted"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Rental not found")
    )
)]
pub async fn delete_rental(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    policy::ensure(policy::require_role(&principal, Role::Admin), "delete rentals")?;

    state.services.rentals.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
