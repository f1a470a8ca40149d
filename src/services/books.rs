//! Book catalog service

use validator::Validate;

use super::{policy, transaction::TransactionCoordinator};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookChanges, BookQuery, CreateBook, NewBook, UpdateBook},
        Principal,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct BooksService<S> {
    coordinator: TransactionCoordinator<S>,
}

impl<S: Repository> BooksService<S> {
    pub fn new(coordinator: TransactionCoordinator<S>) -> Self {
        Self { coordinator }
    }

    pub async fn get(&self, id: i32) -> AppResult<Book> {
        let store = self.coordinator.store().clone();
        self.coordinator
            .read_only(move |tx| Box::pin(async move { store.books_get_by_id(tx, id).await }))
            .await?
            .ok_or(AppError::BookNotFound(id))
    }

    pub async fn list(&self, query: BookQuery) -> AppResult<Vec<Book>> {
        let store = self.coordinator.store().clone();
        self.coordinator
            .read_only(move |tx| Box::pin(async move { store.books_list(tx, &query).await }))
            .await
    }

    /// Create a book; only administrators may pick another owner
    pub async fn create(&self, principal: &Principal, request: CreateBook) -> AppResult<Book> {
        request
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let book = NewBook {
            owner_id: policy::resolve_book_owner(principal, request.owner_id),
            isbn: request.isbn.trim().to_string(),
            title: request.title,
            author: request.author,
            available_copies: request.copies.unwrap_or(1),
        };

        let this = self.clone();
        let created = self
            .coordinator
            .run(move |tx| Box::pin(async move { this.create_in(tx, book).await }))
            .await?;

        tracing::info!("Created book {} owned by user {}", created.id, created.owner_id);
        Ok(created)
    }

    async fn create_in(&self, tx: &mut S::Tx, book: NewBook) -> AppResult<Book> {
        let store = self.coordinator.store();
        if store.users_get_by_id(tx, book.owner_id).await?.is_none() {
            return Err(AppError::UserNotFound(book.owner_id));
        }
        store.books_create(tx, &book).await
    }

    /// Update a book the principal may act on. The owner is resolved the
    /// same way as on creation.
    pub async fn update(
        &self,
        principal: &Principal,
        id: i32,
        request: UpdateBook,
    ) -> AppResult<Book> {
        request
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let this = self.clone();
        let principal = *principal;
        self.coordinator
            .run(move |tx| Box::pin(async move { this.update_in(tx, principal, id, request).await }))
            .await
    }

    async fn update_in(
        &self,
        tx: &mut S::Tx,
        principal: Principal,
        id: i32,
        request: UpdateBook,
    ) -> AppResult<Book> {
        let store = self.coordinator.store();

        let book = store
            .books_get_for_update(tx, id)
            .await?
            .ok_or(AppError::BookNotFound(id))?;
        policy::ensure(
            policy::can_act_on_own_resource(&principal, book.owner_id),
            "update this book",
        )?;

        let owner_id = policy::resolve_book_owner(&principal, request.owner_id);
        if owner_id != book.owner_id && store.users_get_by_id(tx, owner_id).await?.is_none() {
            return Err(AppError::UserNotFound(owner_id));
        }

        let changes = BookChanges {
            owner_id,
            isbn: request.isbn.map(|isbn| isbn.trim().to_string()),
            title: request.title,
            author: request.author,
        };

        store
            .books_update(tx, id, &changes)
            .await?
            .ok_or(AppError::BookNotFound(id))
    }

    /// Move a book from `from_user_id` to `to_user_id`.
    ///
    /// Book, current owner and destination are all checked before the
    /// policy decides, so missing targets surface as not-found.
    pub async fn transfer_ownership(
        &self,
        principal: &Principal,
        book_id: i32,
        from_user_id: i32,
        to_user_id: i32,
    ) -> AppResult<Book> {
        let this = self.clone();
        let principal = *principal;
        let book = self
            .coordinator
            .run(move |tx| {
                Box::pin(async move {
                    this.transfer_in(tx, principal, book_id, from_user_id, to_user_id)
                        .await
                })
            })
            .await?;

        tracing::info!(
            "Book {} transferred from user {} to user {} by user {}",
            book_id,
            from_user_id,
            to_user_id,
            principal.user_id
        );
        Ok(book)
    }

    async fn transfer_in(
        &self,
        tx: &mut S::Tx,
        principal: Principal,
        book_id: i32,
        from_user_id: i32,
        to_user_id: i32,
    ) -> AppResult<Book> {
        let store = self.coordinator.store();

        let book = store
            .books_get_for_update(tx, book_id)
            .await?
            .ok_or(AppError::BookNotFound(book_id))?;

        if book.owner_id != from_user_id {
            return Err(AppError::NotOwner {
                book_id,
                user_id: from_user_id,
            });
        }

        let destination = store
            .users_get_by_id(tx, to_user_id)
            .await?
            .ok_or(AppError::TargetUserNotFound(to_user_id))?;

        policy::ensure(
            policy::can_transfer(&principal, from_user_id, &destination),
            "transfer this book",
        )?;

        store
            .books_set_owner(tx, book_id, to_user_id)
            .await?
            .ok_or(AppError::BookNotFound(book_id))
    }
}
