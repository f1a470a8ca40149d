//! Rental lifecycle: create, return, extend, delete

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use super::{fees, transaction::TransactionCoordinator};
use crate::{
    clock::Clock,
    config::RentalsConfig,
    error::{AppError, AppResult},
    models::{
        payment::{NewPayment, LATE_FEE},
        rental::{ExtendBy, NewRental, Rental, RentalReturn},
    },
    repository::Repository,
};

const MAX_EXTENSION_DAYS: i32 = 365;

#[derive(Clone)]
pub struct RentalLifecycle<S> {
    coordinator: TransactionCoordinator<S>,
    config: Arc<RentalsConfig>,
    clock: Arc<dyn Clock>,
}

impl<S: Repository> RentalLifecycle<S> {
    pub fn new(
        coordinator: TransactionCoordinator<S>,
        config: Arc<RentalsConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            coordinator,
            config,
            clock,
        }
    }

    /// Due date used when a rental request does not name one
    pub fn default_due_date(&self) -> DateTime<Utc> {
        self.clock.now() + Duration::days(self.config.default_loan_days)
    }

    /// Lend one copy of `book_id` to `user_id` until `due_date`
    pub async fn create(
        &self,
        user_id: i32,
        book_id: i32,
        due_date: DateTime<Utc>,
    ) -> AppResult<Rental> {
        let now = self.clock.now();
        if due_date <= now {
            return Err(AppError::Validation("Due date must be in the future".to_string()));
        }

        let this = self.clone();
        let rental = self
            .coordinator
            .run(move |tx| {
                Box::pin(async move { this.create_in(tx, user_id, book_id, now, due_date).await })
            })
            .await?;

        tracing::info!(
            "Rental {} created: book {} to user {} until {}",
            rental.id,
            book_id,
            user_id,
            due_date
        );
        Ok(rental)
    }

    async fn create_in(
        &self,
        tx: &mut S::Tx,
        user_id: i32,
        book_id: i32,
        now: DateTime<Utc>,
        due_date: DateTime<Utc>,
    ) -> AppResult<Rental> {
        let store = self.coordinator.store();

        let user = store
            .users_get_by_id(tx, user_id)
            .await?
            .ok_or(AppError::UserNotFound(user_id))?;

        let book = store
            .books_get_for_update(tx, book_id)
            .await?
            .ok_or(AppError::BookNotFound(book_id))?;

        if book.available_copies <= 0 || !store.books_decrement_available(tx, book_id).await? {
            return Err(AppError::BookNotAvailable(book_id));
        }

        let rental = NewRental {
            user_id,
            book_id,
            rental_date: now,
            due_date,
            user_name: user.display_name(),
            book_title: book.title,
        };

        store.rentals_create(tx, &rental).await
    }

    /// Close an active rental and put the copy back.
    ///
    /// The late fee is computed and recorded after the return commits; a
    /// failure there leaves the return in place and reports no fee.
    pub async fn return_rental(&self, rental_id: i32) -> AppResult<RentalReturn> {
        let now = self.clock.now();
        let this = self.clone();
        let rental = self
            .coordinator
            .run(move |tx| Box::pin(async move { this.return_in(tx, rental_id, now).await }))
            .await?;

        let late_days = fees::late_days(rental.due_date, now);
        let fee = match fees::compute_late_fee(late_days, self.config.late_fee_per_day) {
            Ok(fee) => Some(fee),
            Err(e) => {
                tracing::warn!("Late fee for rental {} could not be computed: {}", rental_id, e);
                None
            }
        };

        let fee = match fee {
            Some(amount) if !amount.is_zero() => self.record_fee(&rental, amount, now).await,
            other => other,
        };

        tracing::info!(
            "Rental {} returned, {} days late, fee {:?}",
            rental_id,
            late_days,
            fee
        );

        Ok(RentalReturn {
            rental,
            late_days,
            fee,
        })
    }

    async fn return_in(&self, tx: &mut S::Tx, rental_id: i32, now: DateTime<Utc>) -> AppResult<Rental> {
        let store = self.coordinator.store();

        let rental = store
            .rentals_get_for_update(tx, rental_id)
            .await?
            .ok_or(AppError::RentalNotFound(rental_id))?;

        if !rental.is_active() {
            return Err(AppError::RentalNotActive(rental_id));
        }

        let returned = store
            .rentals_mark_returned(tx, rental_id, now)
            .await?
            .ok_or(AppError::RentalNotActive(rental_id))?;

        if !store.books_increment_available(tx, rental.book_id).await? {
            return Err(AppError::BookNotFound(rental.book_id));
        }

        Ok(returned)
    }

    async fn record_fee(
        &self,
        rental: &Rental,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Option<Decimal> {
        let payment = NewPayment {
            user_id: rental.user_id,
            rental_id: Some(rental.id),
            amount,
            kind: LATE_FEE.to_string(),
            created_at: now,
        };

        let store = self.coordinator.store().clone();
        match self
            .coordinator
            .run(move |tx| Box::pin(async move { store.payments_create(tx, &payment).await }))
            .await
        {
            Ok(_) => Some(amount),
            Err(e) => {
                tracing::warn!("Late fee for rental {} could not be recorded: {}", rental.id, e);
                None
            }
        }
    }

    /// Push the due date of an active rental later, overdue ones included
    pub async fn extend(&self, rental_id: i32, by: ExtendBy) -> AppResult<Rental> {
        let now = self.clock.now();
        match by {
            ExtendBy::NewDueDate(due_date) if due_date <= now => {
                return Err(AppError::Validation(
                    "New due date must be in the future".to_string(),
                ));
            }
            ExtendBy::AdditionalDays(days) if !(1..=MAX_EXTENSION_DAYS).contains(&days) => {
                return Err(AppError::Validation(format!(
                    "Additional days must be between 1 and {}",
                    MAX_EXTENSION_DAYS
                )));
            }
            _ => {}
        }

        let this = self.clone();
        let rental = self
            .coordinator
            .run(move |tx| Box::pin(async move { this.extend_in(tx, rental_id, by).await }))
            .await?;

        tracing::info!("Rental {} extended until {}", rental_id, rental.due_date);
        Ok(rental.classify(now))
    }

    async fn extend_in(&self, tx: &mut S::Tx, rental_id: i32, by: ExtendBy) -> AppResult<Rental> {
        let store = self.coordinator.store();

        if let Some(rental) = store.rentals_extend(tx, rental_id, by).await? {
            return Ok(rental);
        }

        match store.rentals_get_by_id(tx, rental_id).await? {
            None => Err(AppError::RentalNotFound(rental_id)),
            Some(rental) if !rental.is_active() => Err(AppError::RentalNotActive(rental_id)),
            Some(rental) => Err(AppError::Validation(format!(
                "New due date must be after the current one ({})",
                rental.due_date
            ))),
        }
    }

    /// Administrative hard delete; availability is left as is
    pub async fn delete(&self, rental_id: i32) -> AppResult<()> {
        let store = self.coordinator.store().clone();
        let deleted = self
            .coordinator
            .run(move |tx| Box::pin(async move { store.rentals_delete(tx, rental_id).await }))
            .await?;

        if !deleted {
            return Err(AppError::RentalNotFound(rental_id));
        }

        tracing::info!("Rental {} deleted", rental_id);
        Ok(())
    }

    pub async fn get(&self, rental_id: i32) -> AppResult<Rental> {
        let now = self.clock.now();
        let store = self.coordinator.store().clone();
        let rental = self
            .coordinator
            .read_only(move |tx| Box::pin(async move { store.rentals_get_by_id(tx, rental_id).await }))
            .await?
            .ok_or(AppError::RentalNotFound(rental_id))?;

        Ok(rental.classify(now))
    }

    pub async fn list_for_user(&self, user_id: i32) -> AppResult<Vec<Rental>> {
        let now = self.clock.now();
        let store = self.coordinator.store().clone();
        let rentals = self
            .coordinator
            .read_only(move |tx| {
                Box::pin(async move { store.rentals_list_for_user(tx, user_id).await })
            })
            .await?;

        Ok(rentals.into_iter().map(|r| r.classify(now)).collect())
    }

    pub async fn list_overdue(&self) -> AppResult<Vec<Rental>> {
        let now = self.clock.now();
        let store = self.coordinator.store().clone();
        let rentals = self
            .coordinator
            .read_only(move |tx| Box::pin(async move { store.rentals_list_overdue(tx, now).await }))
            .await?;

        Ok(rentals.into_iter().map(|r| r.classify(now)).collect())
    }
}
