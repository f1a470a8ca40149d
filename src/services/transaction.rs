//! Unit-of-work coordinator
//!
//! Every multi-entity mutation runs through [`TransactionCoordinator::run`]:
//! the store hands out a transaction, the unit of work borrows it, and the
//! coordinator commits on success and rolls back on error, panic or deadline.

use std::any::Any;
use std::future::Future;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use crate::{
    error::{AppError, AppResult},
    repository::Store,
};

/// Boxed future borrowing the transaction handle for `'a`
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type PanicPayload = Box<dyn Any + Send + 'static>;

/// Polls the unit of work, turning a panic into a value so the
/// transaction can be rolled back before the panic resumes.
struct CatchUnwind<'a, T> {
    inner: BoxFuture<'a, T>,
}

impl<T> Future for CatchUnwind<'_, T> {
    type Output = Result<T, PanicPayload>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let inner = self.inner.as_mut();
        match catch_unwind(AssertUnwindSafe(|| inner.poll(cx))) {
            Ok(Poll::Pending) => Poll::Pending,
            Ok(Poll::Ready(value)) => Poll::Ready(Ok(value)),
            Err(payload) => Poll::Ready(Err(payload)),
        }
    }
}

#[derive(Clone)]
pub struct TransactionCoordinator<S> {
    store: S,
    deadline: Option<Duration>,
}

impl<S: Store> TransactionCoordinator<S> {
    /// `deadline` applies to every `run` and `read_only`; `None` disables it
    pub fn new(store: S, deadline: Option<Duration>) -> Self {
        Self { store, deadline }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run `work` in one transaction, committing only if it returns `Ok`.
    ///
    /// The unit of work must not call `run` again: nesting is unsupported.
    pub async fn run<T, F>(&self, work: F) -> AppResult<T>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut S::Tx) -> BoxFuture<'t, AppResult<T>> + Send,
    {
        match self.deadline {
            Some(deadline) => self.run_with_deadline(deadline, work).await,
            None => self.execute(work, true).await,
        }
    }

    /// Like [`run`](Self::run) with an explicit deadline. When it elapses the
    /// in-flight work and its uncommitted transaction are dropped, which
    /// rolls the transaction back.
    pub async fn run_with_deadline<T, F>(&self, deadline: Duration, work: F) -> AppResult<T>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut S::Tx) -> BoxFuture<'t, AppResult<T>> + Send,
    {
        self.bounded(deadline, work, true).await
    }

    /// Run `work` and always roll back, whatever it returns
    pub async fn read_only<T, F>(&self, work: F) -> AppResult<T>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut S::Tx) -> BoxFuture<'t, AppResult<T>> + Send,
    {
        match self.deadline {
            Some(deadline) => self.bounded(deadline, work, false).await,
            None => self.execute(work, false).await,
        }
    }

    async fn bounded<T, F>(&self, deadline: Duration, work: F, commit: bool) -> AppResult<T>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut S::Tx) -> BoxFuture<'t, AppResult<T>> + Send,
    {
        match tokio::time::timeout(deadline, self.execute(work, commit)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Transaction exceeded its deadline of {:?}, rolled back", deadline);
                Err(AppError::Timeout(deadline))
            }
        }
    }

    async fn execute<T, F>(&self, work: F, commit: bool) -> AppResult<T>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut S::Tx) -> BoxFuture<'t, AppResult<T>> + Send,
    {
        let mut tx = self.store.begin().await?;

        let outcome = CatchUnwind {
            inner: work(&mut tx),
        }
        .await;

        match outcome {
            Ok(Ok(value)) if commit => {
                self.store.commit(tx).await?;
                Ok(value)
            }
            Ok(Ok(value)) => {
                self.rollback(tx).await;
                Ok(value)
            }
            Ok(Err(err)) => {
                tracing::debug!("Unit of work failed, rolling back: {}", err);
                self.rollback(tx).await;
                Err(err)
            }
            Err(payload) => {
                tracing::error!("Unit of work panicked, rolling back");
                self.rollback(tx).await;
                resume_unwind(payload)
            }
        }
    }

    async fn rollback(&self, tx: S::Tx) {
        if let Err(e) = self.store.rollback(tx).await {
            tracing::warn!("Rollback failed: {}", e);
        }
    }
}
