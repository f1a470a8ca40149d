//! Business logic services

pub mod auth;
pub mod books;
pub mod fees;
pub mod policy;
pub mod rentals;
pub mod session;
pub mod tokens;
pub mod transaction;
pub mod users;

use std::sync::Arc;

use crate::{clock::Clock, config::AppConfig, repository::Repository};

pub use transaction::{BoxFuture, TransactionCoordinator};

/// Container for all services
#[derive(Clone)]
pub struct Services<S> {
    pub coordinator: TransactionCoordinator<S>,
    pub tokens: tokens::TokenLedger<S>,
    pub session: session::SessionAuthenticator<S>,
    pub auth: auth::AuthService<S>,
    pub users: users::UsersService<S>,
    pub books: books::BooksService<S>,
    pub rentals: rentals::RentalLifecycle<S>,
}

impl<S: Repository> Services<S> {
    /// Create all services over one store
    pub fn new(store: S, config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        let coordinator = TransactionCoordinator::new(store, config.database.transaction_timeout());
        let auth_config = Arc::new(config.auth.clone());

        let tokens = tokens::TokenLedger::new(coordinator.clone(), auth_config.clone(), clock.clone());
        let session =
            session::SessionAuthenticator::new(coordinator.clone(), tokens.clone(), auth_config);

        Self {
            auth: auth::AuthService::new(coordinator.clone(), tokens.clone(), session.clone()),
            users: users::UsersService::new(coordinator.clone(), tokens.clone()),
            books: books::BooksService::new(coordinator.clone()),
            rentals: rentals::RentalLifecycle::new(
                coordinator.clone(),
                Arc::new(config.rentals.clone()),
                clock,
            ),
            coordinator,
            tokens,
            session,
        }
    }
}
