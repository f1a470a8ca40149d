//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, books, health, rentals, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Shelfkeeper API",
        version = "0.4.0",
        description = "Book rental back office REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::register,
        auth::login,
        auth::refresh,
        auth::logout,
        auth::logout_all,
        auth::me,
        // Users
        users::create_user,
        users::get_user,
        users::delete_user,
        users::get_user_rentals,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::transfer_book,
        // Rentals
        rentals::create_rental,
        rentals::list_overdue,
        rentals::get_rental,
        rentals::return_rental,
        rentals::extend_rental,
        rentals::delete_rental,
    ),
    components(
        schemas(
            // Auth
            auth::LoginRequest,
            auth::LogoutRequest,
            auth::LogoutAllResponse,
            crate::models::token::TokenPair,
            crate::models::token::TokenType,
            // Users
            crate::models::user::User,
            crate::models::user::Role,
            crate::models::user::CreateUser,
            crate::models::user::CascadeReport,
            // Books
            crate::models::book::Book,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::book::TransferBook,
            // Rentals
            crate::models::rental::Rental,
            crate::models::rental::RentalStatus,
            crate::models::rental::RentalReturn,
            crate::models::rental::CreateRental,
            crate::models::rental::ExtendRental,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication and session endpoints"),
        (name = "users", description = "User management"),
        (name = "books", description = "Book catalog and ownership"),
        (name = "rentals", description = "Rental lifecycle")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
