//! Issued tokens repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{PgStore, Store};
use crate::{
    error::{AppError, AppResult},
    models::token::{IssuedToken, NewToken},
};

#[async_trait]
pub trait TokensRepository: Store {
    /// Record a freshly issued token. A duplicate value is fatal.
    async fn tokens_create(&self, tx: &mut Self::Tx, token: &NewToken) -> AppResult<IssuedToken>;

    /// Look up a token by its exact value
    async fn tokens_find(&self, tx: &mut Self::Tx, value: &str) -> AppResult<Option<IssuedToken>>;

    /// Flag a token as revoked; false when it was unknown or already revoked
    async fn tokens_revoke(
        &self,
        tx: &mut Self::Tx,
        value: &str,
        revoked_at: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Flag every live token of a user as revoked
    async fn tokens_revoke_all_for_user(
        &self,
        tx: &mut Self::Tx,
        user_id: i32,
        revoked_at: DateTime<Utc>,
    ) -> AppResult<u64>;

    /// Physically delete every token of a user
    async fn tokens_delete_all_for_user(&self, tx: &mut Self::Tx, user_id: i32) -> AppResult<u64>;

    /// Physically delete tokens expired at `now`
    async fn tokens_purge_expired(&self, tx: &mut Self::Tx, now: DateTime<Utc>) -> AppResult<u64>;
}

#[async_trait]
impl TokensRepository for PgStore {
    async fn tokens_create(&self, tx: &mut Self::Tx, token: &NewToken) -> AppResult<IssuedToken> {
        sqlx::query_as::<_, IssuedToken>(
            r#"
            INSERT INTO tokens (user_id, token_value, token_type, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(token.user_id)
        .bind(&token.token_value)
        .bind(token.token_type)
        .bind(token.expires_at)
        .bind(token.created_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Internal("issued token value collided with an existing token".to_string())
            }
            _ => AppError::Database(e),
        })
    }

    async fn tokens_find(&self, tx: &mut Self::Tx, value: &str) -> AppResult<Option<IssuedToken>> {
        let token = sqlx::query_as::<_, IssuedToken>("SELECT * FROM tokens WHERE token_value = $1")
            .bind(value)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(token)
    }

    async fn tokens_revoke(
        &self,
        tx: &mut Self::Tx,
        value: &str,
        revoked_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tokens
            SET is_revoked = TRUE, revoked_at = $2
            WHERE token_value = $1 AND NOT is_revoked
            "#,
        )
        .bind(value)
        .bind(revoked_at)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn tokens_revoke_all_for_user(
        &self,
        tx: &mut Self::Tx,
        user_id: i32,
        revoked_at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE tokens
            SET is_revoked = TRUE, revoked_at = $2
            WHERE user_id = $1 AND NOT is_revoked
            "#,
        )
        .bind(user_id)
        .bind(revoked_at)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn tokens_delete_all_for_user(&self, tx: &mut Self::Tx, user_id: i32) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn tokens_purge_expired(&self, tx: &mut Self::Tx, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }
}
