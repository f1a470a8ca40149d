//! Users repository for database operations

use async_trait::async_trait;

use super::{conflict_on_unique, PgStore, Store};
use crate::{
    error::AppResult,
    models::user::{NewUser, User},
};

#[async_trait]
pub trait UsersRepository: Store {
    /// Get user by ID
    async fn users_get_by_id(&self, tx: &mut Self::Tx, id: i32) -> AppResult<Option<User>>;

    /// Get user by login (case-insensitive)
    async fn users_get_by_login(&self, tx: &mut Self::Tx, login: &str) -> AppResult<Option<User>>;

    /// Create a new user; duplicate login or email is a conflict
    async fn users_create(&self, tx: &mut Self::Tx, user: &NewUser) -> AppResult<User>;

    /// Delete a user row, returning whether one was deleted
    async fn users_delete(&self, tx: &mut Self::Tx, id: i32) -> AppResult<bool>;
}

#[async_trait]
impl UsersRepository for PgStore {
    async fn users_get_by_id(&self, tx: &mut Self::Tx, id: i32) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(user)
    }

    async fn users_get_by_login(&self, tx: &mut Self::Tx, login: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(login) = LOWER($1)")
            .bind(login)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(user)
    }

    async fn users_create(&self, tx: &mut Self::Tx, user: &NewUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (login, password, firstname, lastname, email, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&user.login)
        .bind(&user.password)
        .bind(&user.firstname)
        .bind(&user.lastname)
        .bind(&user.email)
        .bind(user.role)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| conflict_on_unique(e, "Login or email already exists"))
    }

    async fn users_delete(&self, tx: &mut Self::Tx, id: i32) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
