//! Rentals repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{PgStore, Store};
use crate::{
    error::AppResult,
    models::rental::{ExtendBy, NewRental, Rental, RentalStatus},
};

#[async_trait]
pub trait RentalsRepository: Store {
    /// Get rental by ID
    async fn rentals_get_by_id(&self, tx: &mut Self::Tx, id: i32) -> AppResult<Option<Rental>>;

    /// Get rental by ID and lock its row until the transaction ends
    async fn rentals_get_for_update(&self, tx: &mut Self::Tx, id: i32)
        -> AppResult<Option<Rental>>;

    /// Insert an active rental
    async fn rentals_create(&self, tx: &mut Self::Tx, rental: &NewRental) -> AppResult<Rental>;

    /// Close an active rental; `None` when no active row matched
    async fn rentals_mark_returned(
        &self,
        tx: &mut Self::Tx,
        id: i32,
        returned_at: DateTime<Utc>,
    ) -> AppResult<Option<Rental>>;

    /// Move the due date of an active rental later in one guarded statement;
    /// `None` when no active row matched or the new date is not later
    async fn rentals_extend(
        &self,
        tx: &mut Self::Tx,
        id: i32,
        by: ExtendBy,
    ) -> AppResult<Option<Rental>>;

    /// Hard delete, returning whether a row was deleted
    async fn rentals_delete(&self, tx: &mut Self::Tx, id: i32) -> AppResult<bool>;

    /// All rentals of a user, newest first
    async fn rentals_list_for_user(&self, tx: &mut Self::Tx, user_id: i32)
        -> AppResult<Vec<Rental>>;

    /// Active rentals whose due date is before `now`
    async fn rentals_list_overdue(
        &self,
        tx: &mut Self::Tx,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Rental>>;

    /// Active rentals borrowed by the user or taken on the user's books
    async fn rentals_count_active_involving(&self, tx: &mut Self::Tx, user_id: i32)
        -> AppResult<i64>;

    /// Delete rentals borrowed by the user or taken on the user's books
    async fn rentals_delete_involving(&self, tx: &mut Self::Tx, user_id: i32) -> AppResult<u64>;
}

#[async_trait]
impl RentalsRepository for PgStore {
    async fn rentals_get_by_id(&self, tx: &mut Self::Tx, id: i32) -> AppResult<Option<Rental>> {
        let rental = sqlx::query_as::<_, Rental>("SELECT * FROM rentals WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(rental)
    }

    async fn rentals_get_for_update(
        &self,
        tx: &mut Self::Tx,
        id: i32,
    ) -> AppResult<Option<Rental>> {
        let rental = sqlx::query_as::<_, Rental>("SELECT * FROM rentals WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(rental)
    }

    async fn rentals_create(&self, tx: &mut Self::Tx, rental: &NewRental) -> AppResult<Rental> {
        let rental = sqlx::query_as::<_, Rental>(
            r#"
            INSERT INTO rentals (user_id, book_id, rental_date, due_date, status, user_name, book_title)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(rental.user_id)
        .bind(rental.book_id)
        .bind(rental.rental_date)
        .bind(rental.due_date)
        .bind(RentalStatus::Active)
        .bind(&rental.user_name)
        .bind(&rental.book_title)
        .fetch_one(&mut **tx)
        .await?;

        Ok(rental)
    }

    async fn rentals_mark_returned(
        &self,
        tx: &mut Self::Tx,
        id: i32,
        returned_at: DateTime<Utc>,
    ) -> AppResult<Option<Rental>> {
        let rental = sqlx::query_as::<_, Rental>(
            r#"
            UPDATE rentals
            SET status = $3, return_date = $2
            WHERE id = $1 AND status = $4
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(returned_at)
        .bind(RentalStatus::Returned)
        .bind(RentalStatus::Active)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(rental)
    }

    async fn rentals_extend(
        &self,
        tx: &mut Self::Tx,
        id: i32,
        by: ExtendBy,
    ) -> AppResult<Option<Rental>> {
        let query = match by {
            ExtendBy::NewDueDate(due_date) => sqlx::query_as::<_, Rental>(
                r#"
                UPDATE rentals
                SET due_date = $2
                WHERE id = $1 AND status = $3 AND due_date < $2
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(due_date),
            ExtendBy::AdditionalDays(days) => sqlx::query_as::<_, Rental>(
                r#"
                UPDATE rentals
                SET due_date = due_date + make_interval(days => $2)
                WHERE id = $1 AND status = $3
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(days),
        };

        let rental = query
            .bind(RentalStatus::Active)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(rental)
    }

    async fn rentals_delete(&self, tx: &mut Self::Tx, id: i32) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM rentals WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn rentals_list_for_user(
        &self,
        tx: &mut Self::Tx,
        user_id: i32,
    ) -> AppResult<Vec<Rental>> {
        let rentals = sqlx::query_as::<_, Rental>(
            "SELECT * FROM rentals WHERE user_id = $1 ORDER BY rental_date DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&mut **tx)
        .await?;

        Ok(rentals)
    }

    async fn rentals_list_overdue(
        &self,
        tx: &mut Self::Tx,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Rental>> {
        let rentals = sqlx::query_as::<_, Rental>(
            r#"
            SELECT * FROM rentals
            WHERE status = $1 AND return_date IS NULL AND due_date < $2
            ORDER BY due_date, id
            "#,
        )
        .bind(RentalStatus::Active)
        .bind(now)
        .fetch_all(&mut **tx)
        .await?;

        Ok(rentals)
    }

    async fn rentals_count_active_involving(
        &self,
        tx: &mut Self::Tx,
        user_id: i32,
    ) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM rentals
            WHERE status = $2
              AND (user_id = $1 OR book_id IN (SELECT id FROM books WHERE owner_id = $1))
            "#,
        )
        .bind(user_id)
        .bind(RentalStatus::Active)
        .fetch_one(&mut **tx)
        .await?;

        Ok(count)
    }

    async fn rentals_delete_involving(&self, tx: &mut Self::Tx, user_id: i32) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM rentals
            WHERE user_id = $1 OR book_id IN (SELECT id FROM books WHERE owner_id = $1)
            "#,
        )
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected())
    }
}
