//! Books repository for database operations

use async_trait::async_trait;

use super::{conflict_on_unique, PgStore, Store};
use crate::{
    error::AppResult,
    models::book::{Book, BookChanges, BookQuery, NewBook},
};

#[async_trait]
pub trait BooksRepository: Store {
    /// Get book by ID
    async fn books_get_by_id(&self, tx: &mut Self::Tx, id: i32) -> AppResult<Option<Book>>;

    /// Get book by ID and lock its row until the transaction ends
    async fn books_get_for_update(&self, tx: &mut Self::Tx, id: i32) -> AppResult<Option<Book>>;

    /// List books, optionally filtered by owner and availability
    async fn books_list(&self, tx: &mut Self::Tx, query: &BookQuery) -> AppResult<Vec<Book>>;

    /// Create a new book; duplicate ISBN is a conflict
    async fn books_create(&self, tx: &mut Self::Tx, book: &NewBook) -> AppResult<Book>;

    /// Apply column changes, returning the updated row if it exists
    async fn books_update(
        &self,
        tx: &mut Self::Tx,
        id: i32,
        changes: &BookChanges,
    ) -> AppResult<Option<Book>>;

    /// Reassign the owner, returning the updated row if it exists
    async fn books_set_owner(
        &self,
        tx: &mut Self::Tx,
        id: i32,
        owner_id: i32,
    ) -> AppResult<Option<Book>>;

    /// Take one copy if any is left; false when none was available
    async fn books_decrement_available(&self, tx: &mut Self::Tx, id: i32) -> AppResult<bool>;

    /// Put one copy back; false when the book does not exist
    async fn books_increment_available(&self, tx: &mut Self::Tx, id: i32) -> AppResult<bool>;

    /// Delete every book owned by a user
    async fn books_delete_by_owner(&self, tx: &mut Self::Tx, owner_id: i32) -> AppResult<u64>;
}

#[async_trait]
impl BooksRepository for PgStore {
    async fn books_get_by_id(&self, tx: &mut Self::Tx, id: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(book)
    }

    async fn books_get_for_update(&self, tx: &mut Self::Tx, id: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(book)
    }

    async fn books_list(&self, tx: &mut Self::Tx, query: &BookQuery) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT * FROM books
            WHERE ($1::INTEGER IS NULL OR owner_id = $1)
              AND (NOT $2 OR available_copies > 0)
            ORDER BY title, id
            "#,
        )
        .bind(query.owner_id)
        .bind(query.available_only.unwrap_or(false))
        .fetch_all(&mut **tx)
        .await?;

        Ok(books)
    }

    async fn books_create(&self, tx: &mut Self::Tx, book: &NewBook) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (owner_id, isbn, title, author, available_copies)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(book.owner_id)
        .bind(&book.isbn)
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.available_copies)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| conflict_on_unique(e, format!("A book with ISBN {} already exists", book.isbn)))
    }

    async fn books_update(
        &self,
        tx: &mut Self::Tx,
        id: i32,
        changes: &BookChanges,
    ) -> AppResult<Option<Book>> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET owner_id = $2,
                isbn = COALESCE($3, isbn),
                title = COALESCE($4, title),
                author = COALESCE($5, author),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.owner_id)
        .bind(&changes.isbn)
        .bind(&changes.title)
        .bind(&changes.author)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| conflict_on_unique(e, "A book with this ISBN already exists"))
    }

    async fn books_set_owner(
        &self,
        tx: &mut Self::Tx,
        id: i32,
        owner_id: i32,
    ) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(
            "UPDATE books SET owner_id = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(book)
    }

    async fn books_decrement_available(&self, tx: &mut Self::Tx, id: i32) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE books
            SET available_copies = available_copies - 1, updated_at = NOW()
            WHERE id = $1 AND available_copies > 0
            "#,
        )
        .bind(id)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn books_increment_available(&self, tx: &mut Self::Tx, id: i32) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE books
            SET available_copies = available_copies + 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn books_delete_by_owner(&self, tx: &mut Self::Tx, owner_id: i32) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM books WHERE owner_id = $1")
            .bind(owner_id)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }
}
