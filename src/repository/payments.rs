//! Payments repository for database operations

use async_trait::async_trait;

use super::{PgStore, Store};
use crate::{
    error::AppResult,
    models::payment::{NewPayment, Payment},
};

#[async_trait]
pub trait PaymentsRepository: Store {
    async fn payments_create(&self, tx: &mut Self::Tx, payment: &NewPayment) -> AppResult<Payment>;

    async fn payments_list_for_user(&self, tx: &mut Self::Tx, user_id: i32)
        -> AppResult<Vec<Payment>>;

    async fn payments_delete_for_user(&self, tx: &mut Self::Tx, user_id: i32) -> AppResult<u64>;
}

#[async_trait]
impl PaymentsRepository for PgStore {
    async fn payments_create(&self, tx: &mut Self::Tx, payment: &NewPayment) -> AppResult<Payment> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (user_id, rental_id, amount, kind, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(payment.user_id)
        .bind(payment.rental_id)
        .bind(payment.amount)
        .bind(&payment.kind)
        .bind(payment.created_at)
        .fetch_one(&mut **tx)
        .await?;

        Ok(payment)
    }

    async fn payments_list_for_user(
        &self,
        tx: &mut Self::Tx,
        user_id: i32,
    ) -> AppResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&mut **tx)
        .await?;

        Ok(payments)
    }

    async fn payments_delete_for_user(&self, tx: &mut Self::Tx, user_id: i32) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM payments WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }
}
