//! Repository layer for database operations
//!
//! Every repository method takes an explicit transaction handle (`&mut
//! Store::Tx`), so transactional and non-transactional call sites share one
//! code path. The `TransactionCoordinator` owns begin/commit/rollback.

pub mod books;
pub mod memory;
pub mod payments;
pub mod rentals;
pub mod tokens;
pub mod users;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Transaction};

use crate::error::{AppError, AppResult};

pub use books::BooksRepository;
pub use memory::MemoryStore;
pub use payments::PaymentsRepository;
pub use rentals::RentalsRepository;
pub use tokens::TokensRepository;
pub use users::UsersRepository;

/// A relational store able to hand out transaction handles.
///
/// Dropping a handle that was neither committed nor rolled back must roll
/// it back; cancellation and deadlines rely on that.
#[async_trait]
pub trait Store: Clone + Send + Sync + 'static {
    type Tx: Send + 'static;

    async fn begin(&self) -> AppResult<Self::Tx>;

    /// Commit the transaction. On failure the transaction is rolled back
    /// before the error is returned.
    async fn commit(&self, tx: Self::Tx) -> AppResult<()>;

    async fn rollback(&self, tx: Self::Tx) -> AppResult<()>;

    /// Connectivity check used by the readiness probe
    async fn ping(&self) -> AppResult<()>;
}

/// Everything the services need from a store
pub trait Repository:
    Store + UsersRepository + BooksRepository + RentalsRepository + TokensRepository + PaymentsRepository
{
}

impl<T> Repository for T where
    T: Store
        + UsersRepository
        + BooksRepository
        + RentalsRepository
        + TokensRepository
        + PaymentsRepository
{
}

/// PostgreSQL store holding the connection pool
#[derive(Clone)]
pub struct PgStore {
    pub pool: Pool<Postgres>,
}

impl PgStore {
    /// Create a new store with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> AppResult<Self::Tx> {
        self.pool
            .begin()
            .await
            .map_err(|e| AppError::Transaction(format!("begin failed: {}", e)))
    }

    async fn commit(&self, tx: Self::Tx) -> AppResult<()> {
        // A failed COMMIT leaves the transaction open; sqlx rolls it back
        // when the handle is dropped on the error path.
        tx.commit()
            .await
            .map_err(|e| AppError::Transaction(format!("commit failed: {}", e)))
    }

    async fn rollback(&self, tx: Self::Tx) -> AppResult<()> {
        tx.rollback()
            .await
            .map_err(|e| AppError::Transaction(format!("rollback failed: {}", e)))
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Map a unique-constraint violation to a conflict, anything else to a
/// database error.
pub(crate) fn conflict_on_unique(err: sqlx::Error, message: impl Into<String>) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(message.into()),
        _ => AppError::Database(err),
    }
}
