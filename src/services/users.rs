//! User management service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use validator::Validate;

use super::{tokens::TokenLedger, transaction::TransactionCoordinator};
use crate::{
    error::{AppError, AppResult},
    models::{
        user::{CascadeReport, CreateUser, NewUser},
        Role, User,
    },
    repository::Repository,
};

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Check a password against the user's stored hash; users without a
/// password cannot log in.
pub fn verify_password(user: &User, password: &str) -> AppResult<bool> {
    match &user.password {
        Some(hash) => {
            let parsed_hash = PasswordHash::new(hash)
                .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
            Ok(Argon2::default()
                .verify_password(password.as_bytes(), &parsed_hash)
                .is_ok())
        }
        None => Ok(false),
    }
}

#[derive(Clone)]
pub struct UsersService<S> {
    coordinator: TransactionCoordinator<S>,
    ledger: TokenLedger<S>,
}

impl<S: Repository> UsersService<S> {
    pub fn new(coordinator: TransactionCoordinator<S>, ledger: TokenLedger<S>) -> Self {
        Self {
            coordinator,
            ledger,
        }
    }

    /// Self-registration; the requested role is ignored
    pub async fn register(&self, request: CreateUser) -> AppResult<User> {
        self.create_with_role(request, Role::User).await
    }

    /// Administrative creation with any role (defaults to `User`)
    pub async fn create_user(&self, request: CreateUser) -> AppResult<User> {
        let role = request.role.unwrap_or(Role::User);
        self.create_with_role(request, role).await
    }

    async fn create_with_role(&self, request: CreateUser, role: Role) -> AppResult<User> {
        request
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let user = NewUser {
            login: request.login.trim().to_string(),
            password: Some(hash_password(&request.password)?),
            firstname: request.firstname,
            lastname: request.lastname,
            email: request.email,
            role,
        };

        let store = self.coordinator.store().clone();
        let created = self
            .coordinator
            .run(move |tx| Box::pin(async move { store.users_create(tx, &user).await }))
            .await?;

        tracing::info!("Created user {} ({}) with role {}", created.id, created.login, created.role);
        Ok(created)
    }

    pub async fn get(&self, id: i32) -> AppResult<User> {
        let store = self.coordinator.store().clone();
        self.coordinator
            .read_only(move |tx| Box::pin(async move { store.users_get_by_id(tx, id).await }))
            .await?
            .ok_or(AppError::UserNotFound(id))
    }

    /// Delete a user and everything hanging off it in one transaction.
    ///
    /// Administrators cannot be deleted, and neither can users with an
    /// active rental as borrower or on one of their books. Dependents go
    /// first: payments, rentals, books, tokens, then the user row.
    pub async fn cascade_delete(&self, user_id: i32) -> AppResult<CascadeReport> {
        let this = self.clone();
        let report = self
            .coordinator
            .run(move |tx| Box::pin(async move { this.cascade_delete_in(tx, user_id).await }))
            .await?;

        tracing::info!(
            "Deleted user {}: {} payments, {} rentals, {} books, {} tokens",
            report.user_id,
            report.payments_deleted,
            report.rentals_deleted,
            report.books_deleted,
            report.tokens_deleted
        );
        Ok(report)
    }

    async fn cascade_delete_in(&self, tx: &mut S::Tx, user_id: i32) -> AppResult<CascadeReport> {
        let store = self.coordinator.store();

        let user = store
            .users_get_by_id(tx, user_id)
            .await?
            .ok_or(AppError::UserNotFound(user_id))?;

        if user.role == Role::Admin {
            return Err(AppError::CannotDeleteAdmin);
        }

        let active = store.rentals_count_active_involving(tx, user_id).await?;
        if active > 0 {
            return Err(AppError::Conflict(format!(
                "User {} has {} active rentals",
                user_id, active
            )));
        }

        let payments_deleted = store.payments_delete_for_user(tx, user_id).await?;
        let rentals_deleted = store.rentals_delete_involving(tx, user_id).await?;
        let books_deleted = store.books_delete_by_owner(tx, user_id).await?;
        let tokens_deleted = self.ledger.delete_all_for_user_in(tx, user_id).await?;

        if !store.users_delete(tx, user_id).await? {
            return Err(AppError::UserNotFound(user_id));
        }

        Ok(CascadeReport {
            user_id,
            payments_deleted,
            rentals_deleted,
            books_deleted,
            tokens_deleted,
        })
    }
}
