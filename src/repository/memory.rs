//! In-process store honoring the same transactional contract as PostgreSQL.
//!
//! A transaction holds the single table lock from `begin` until it ends, so
//! transactions are fully serialised. Writes go straight to the tables; a
//! snapshot taken at `begin` is restored on rollback or when an unfinished
//! handle is dropped.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::{
    BooksRepository, PaymentsRepository, RentalsRepository, Store, TokensRepository,
    UsersRepository,
};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookChanges, BookQuery, NewBook},
        payment::{NewPayment, Payment},
        rental::{ExtendBy, NewRental, Rental, RentalStatus},
        token::{IssuedToken, NewToken},
        user::{NewUser, User},
    },
};

/// Places where a one-shot storage failure can be injected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Begin,
    Commit,
    CreateRental,
    IncrementAvailable,
    DeleteTokens,
    CreatePayment,
}

#[derive(Debug, Clone, Default)]
struct Sequences {
    users: i32,
    books: i32,
    rentals: i32,
    tokens: i32,
    payments: i32,
}

fn next_id(seq: &mut i32) -> i32 {
    *seq += 1;
    *seq
}

#[derive(Debug, Clone, Default)]
struct Tables {
    users: BTreeMap<i32, User>,
    books: BTreeMap<i32, Book>,
    rentals: BTreeMap<i32, Rental>,
    tokens: BTreeMap<i32, IssuedToken>,
    payments: BTreeMap<i32, Payment>,
    sequences: Sequences,
}

impl Tables {
    fn owned_book_ids(&self, owner_id: i32) -> HashSet<i32> {
        self.books
            .values()
            .filter(|b| b.owner_id == owner_id)
            .map(|b| b.id)
            .collect()
    }

    fn isbn_taken(&self, isbn: &str, except: Option<i32>) -> bool {
        self.books
            .values()
            .any(|b| b.isbn == isbn && Some(b.id) != except)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<AsyncMutex<Tables>>,
    faults: Arc<Mutex<HashSet<FailPoint>>>,
}

/// Transaction handle of the in-process store
pub struct MemoryTx {
    tables: OwnedMutexGuard<Tables>,
    snapshot: Option<Tables>,
}

impl MemoryTx {
    fn finish(mut self) {
        self.snapshot = None;
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.tables = snapshot;
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next operation reaching `point` fail
    pub fn fail_next(&self, point: FailPoint) {
        self.faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(point);
    }

    fn check(&self, point: FailPoint) -> AppResult<()> {
        let tripped = self
            .faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&point);

        if tripped {
            Err(AppError::Transaction(format!("injected failure at {:?}", point)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> AppResult<Self::Tx> {
        self.check(FailPoint::Begin)?;
        let tables = self.tables.clone().lock_owned().await;
        let snapshot = tables.clone();
        Ok(MemoryTx {
            tables,
            snapshot: Some(snapshot),
        })
    }

    async fn commit(&self, tx: Self::Tx) -> AppResult<()> {
        // Dropping the handle on the error path restores the snapshot.
        self.check(FailPoint::Commit)?;
        tx.finish();
        Ok(())
    }

    async fn rollback(&self, tx: Self::Tx) -> AppResult<()> {
        drop(tx);
        Ok(())
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl UsersRepository for MemoryStore {
    async fn users_get_by_id(&self, tx: &mut Self::Tx, id: i32) -> AppResult<Option<User>> {
        Ok(tx.tables.users.get(&id).cloned())
    }

    async fn users_get_by_login(&self, tx: &mut Self::Tx, login: &str) -> AppResult<Option<User>> {
        Ok(tx
            .tables
            .users
            .values()
            .find(|u| u.login.eq_ignore_ascii_case(login))
            .cloned())
    }

    async fn users_create(&self, tx: &mut Self::Tx, user: &NewUser) -> AppResult<User> {
        let tables = &mut *tx.tables;
        let duplicate = tables.users.values().any(|u| {
            u.login.eq_ignore_ascii_case(&user.login)
                || (user.email.is_some() && u.email == user.email)
        });
        if duplicate {
            return Err(AppError::Conflict("Login or email already exists".to_string()));
        }

        let row = User {
            id: next_id(&mut tables.sequences.users),
            login: user.login.clone(),
            password: user.password.clone(),
            firstname: user.firstname.clone(),
            lastname: user.lastname.clone(),
            email: user.email.clone(),
            role: user.role,
            created_at: Utc::now(),
        };
        tables.users.insert(row.id, row.clone());
        Ok(row)
    }

    async fn users_delete(&self, tx: &mut Self::Tx, id: i32) -> AppResult<bool> {
        Ok(tx.tables.users.remove(&id).is_some())
    }
}

#[async_trait]
impl BooksRepository for MemoryStore {
    async fn books_get_by_id(&self, tx: &mut Self::Tx, id: i32) -> AppResult<Option<Book>> {
        Ok(tx.tables.books.get(&id).cloned())
    }

    async fn books_get_for_update(&self, tx: &mut Self::Tx, id: i32) -> AppResult<Option<Book>> {
        Ok(tx.tables.books.get(&id).cloned())
    }

    async fn books_list(&self, tx: &mut Self::Tx, query: &BookQuery) -> AppResult<Vec<Book>> {
        let available_only = query.available_only.unwrap_or(false);
        let mut books: Vec<Book> = tx
            .tables
            .books
            .values()
            .filter(|b| query.owner_id.map_or(true, |owner| b.owner_id == owner))
            .filter(|b| !available_only || b.available_copies > 0)
            .cloned()
            .collect();
        books.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(books)
    }

    async fn books_create(&self, tx: &mut Self::Tx, book: &NewBook) -> AppResult<Book> {
        let tables = &mut *tx.tables;
        if tables.isbn_taken(&book.isbn, None) {
            return Err(AppError::Conflict(format!(
                "A book with ISBN {} already exists",
                book.isbn
            )));
        }

        let now = Utc::now();
        let row = Book {
            id: next_id(&mut tables.sequences.books),
            owner_id: book.owner_id,
            isbn: book.isbn.clone(),
            title: book.title.clone(),
            author: book.author.clone(),
            available_copies: book.available_copies,
            created_at: now,
            updated_at: now,
        };
        tables.books.insert(row.id, row.clone());
        Ok(row)
    }

    async fn books_update(
        &self,
        tx: &mut Self::Tx,
        id: i32,
        changes: &BookChanges,
    ) -> AppResult<Option<Book>> {
        let tables = &mut *tx.tables;
        if let Some(isbn) = &changes.isbn {
            if tables.isbn_taken(isbn, Some(id)) {
                return Err(AppError::Conflict(
                    "A book with this ISBN already exists".to_string(),
                ));
            }
        }

        Ok(tables.books.get_mut(&id).map(|book| {
            book.owner_id = changes.owner_id;
            if let Some(isbn) = &changes.isbn {
                book.isbn = isbn.clone();
            }
            if let Some(title) = &changes.title {
                book.title = title.clone();
            }
            if let Some(author) = &changes.author {
                book.author = Some(author.clone());
            }
            book.updated_at = Utc::now();
            book.clone()
        }))
    }

    async fn books_set_owner(
        &self,
        tx: &mut Self::Tx,
        id: i32,
        owner_id: i32,
    ) -> AppResult<Option<Book>> {
        Ok(tx.tables.books.get_mut(&id).map(|book| {
            book.owner_id = owner_id;
            book.updated_at = Utc::now();
            book.clone()
        }))
    }

    async fn books_decrement_available(&self, tx: &mut Self::Tx, id: i32) -> AppResult<bool> {
        match tx.tables.books.get_mut(&id) {
            Some(book) if book.available_copies > 0 => {
                book.available_copies -= 1;
                book.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn books_increment_available(&self, tx: &mut Self::Tx, id: i32) -> AppResult<bool> {
        self.check(FailPoint::IncrementAvailable)?;
        match tx.tables.books.get_mut(&id) {
            Some(book) => {
                book.available_copies += 1;
                book.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn books_delete_by_owner(&self, tx: &mut Self::Tx, owner_id: i32) -> AppResult<u64> {
        let books = &mut tx.tables.books;
        let before = books.len();
        books.retain(|_, b| b.owner_id != owner_id);
        Ok((before - books.len()) as u64)
    }
}

#[async_trait]
impl RentalsRepository for MemoryStore {
    async fn rentals_get_by_id(&self, tx: &mut Self::Tx, id: i32) -> AppResult<Option<Rental>> {
        Ok(tx.tables.rentals.get(&id).cloned())
    }

    async fn rentals_get_for_update(
        &self,
        tx: &mut Self::Tx,
        id: i32,
    ) -> AppResult<Option<Rental>> {
        Ok(tx.tables.rentals.get(&id).cloned())
    }

    async fn rentals_create(&self, tx: &mut Self::Tx, rental: &NewRental) -> AppResult<Rental> {
        self.check(FailPoint::CreateRental)?;
        let tables = &mut *tx.tables;
        let row = Rental {
            id: next_id(&mut tables.sequences.rentals),
            user_id: rental.user_id,
            book_id: rental.book_id,
            rental_date: rental.rental_date,
            due_date: rental.due_date,
            return_date: None,
            status: RentalStatus::Active,
            user_name: rental.user_name.clone(),
            book_title: rental.book_title.clone(),
        };
        tables.rentals.insert(row.id, row.clone());
        Ok(row)
    }

    async fn rentals_mark_returned(
        &self,
        tx: &mut Self::Tx,
        id: i32,
        returned_at: DateTime<Utc>,
    ) -> AppResult<Option<Rental>> {
        Ok(tx
            .tables
            .rentals
            .get_mut(&id)
            .filter(|r| r.status == RentalStatus::Active)
            .map(|rental| {
                rental.status = RentalStatus::Returned;
                rental.return_date = Some(returned_at);
                rental.clone()
            }))
    }

    async fn rentals_extend(
        &self,
        tx: &mut Self::Tx,
        id: i32,
        by: ExtendBy,
    ) -> AppResult<Option<Rental>> {
        Ok(tx
            .tables
            .rentals
            .get_mut(&id)
            .filter(|r| r.status == RentalStatus::Active)
            .filter(|r| match by {
                ExtendBy::NewDueDate(due_date) => r.due_date < due_date,
                ExtendBy::AdditionalDays(_) => true,
            })
            .map(|rental| {
                rental.due_date = match by {
                    ExtendBy::NewDueDate(due_date) => due_date,
                    ExtendBy::AdditionalDays(days) => rental.due_date + Duration::days(days as i64),
                };
                rental.clone()
            }))
    }

    async fn rentals_delete(&self, tx: &mut Self::Tx, id: i32) -> AppResult<bool> {
        Ok(tx.tables.rentals.remove(&id).is_some())
    }

    async fn rentals_list_for_user(
        &self,
        tx: &mut Self::Tx,
        user_id: i32,
    ) -> AppResult<Vec<Rental>> {
        let mut rentals: Vec<Rental> = tx
            .tables
            .rentals
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        rentals.sort_by(|a, b| b.rental_date.cmp(&a.rental_date).then(b.id.cmp(&a.id)));
        Ok(rentals)
    }

    async fn rentals_list_overdue(
        &self,
        tx: &mut Self::Tx,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Rental>> {
        let mut rentals: Vec<Rental> = tx
            .tables
            .rentals
            .values()
            .filter(|r| r.is_overdue_at(now))
            .cloned()
            .collect();
        rentals.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.id.cmp(&b.id)));
        Ok(rentals)
    }

    async fn rentals_count_active_involving(
        &self,
        tx: &mut Self::Tx,
        user_id: i32,
    ) -> AppResult<i64> {
        let owned = tx.tables.owned_book_ids(user_id);
        let count = tx
            .tables
            .rentals
            .values()
            .filter(|r| r.status == RentalStatus::Active)
            .filter(|r| r.user_id == user_id || owned.contains(&r.book_id))
            .count();
        Ok(count as i64)
    }

    async fn rentals_delete_involving(&self, tx: &mut Self::Tx, user_id: i32) -> AppResult<u64> {
        let owned = tx.tables.owned_book_ids(user_id);
        let tables = &mut *tx.tables;
        let before = tables.rentals.len();
        tables
            .rentals
            .retain(|_, r| r.user_id != user_id && !owned.contains(&r.book_id));

        // payments.rental_id is ON DELETE SET NULL
        let rentals = &tables.rentals;
        for payment in tables.payments.values_mut() {
            if payment.rental_id.is_some_and(|id| !rentals.contains_key(&id)) {
                payment.rental_id = None;
            }
        }

        Ok((before - tables.rentals.len()) as u64)
    }
}

#[async_trait]
impl TokensRepository for MemoryStore {
    async fn tokens_create(&self, tx: &mut Self::Tx, token: &NewToken) -> AppResult<IssuedToken> {
        let tables = &mut *tx.tables;
        if tables
            .tokens
            .values()
            .any(|t| t.token_value == token.token_value)
        {
            return Err(AppError::Internal(
                "issued token value collided with an existing token".to_string(),
            ));
        }

        let row = IssuedToken {
            id: next_id(&mut tables.sequences.tokens),
            user_id: token.user_id,
            token_value: token.token_value.clone(),
            token_type: token.token_type,
            expires_at: token.expires_at,
            is_revoked: false,
            revoked_at: None,
            created_at: token.created_at,
        };
        tables.tokens.insert(row.id, row.clone());
        Ok(row)
    }

    async fn tokens_find(&self, tx: &mut Self::Tx, value: &str) -> AppResult<Option<IssuedToken>> {
        Ok(tx
            .tables
            .tokens
            .values()
            .find(|t| t.token_value == value)
            .cloned())
    }

    async fn tokens_revoke(
        &self,
        tx: &mut Self::Tx,
        value: &str,
        revoked_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        match tx
            .tables
            .tokens
            .values_mut()
            .find(|t| t.token_value == value && !t.is_revoked)
        {
            Some(token) => {
                token.is_revoked = true;
                token.revoked_at = Some(revoked_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn tokens_revoke_all_for_user(
        &self,
        tx: &mut Self::Tx,
        user_id: i32,
        revoked_at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut revoked = 0;
        for token in tx
            .tables
            .tokens
            .values_mut()
            .filter(|t| t.user_id == user_id && !t.is_revoked)
        {
            token.is_revoked = true;
            token.revoked_at = Some(revoked_at);
            revoked += 1;
        }
        Ok(revoked)
    }

    async fn tokens_delete_all_for_user(&self, tx: &mut Self::Tx, user_id: i32) -> AppResult<u64> {
        self.check(FailPoint::DeleteTokens)?;
        let tokens = &mut tx.tables.tokens;
        let before = tokens.len();
        tokens.retain(|_, t| t.user_id != user_id);
        Ok((before - tokens.len()) as u64)
    }

    async fn tokens_purge_expired(&self, tx: &mut Self::Tx, now: DateTime<Utc>) -> AppResult<u64> {
        let tokens = &mut tx.tables.tokens;
        let before = tokens.len();
        tokens.retain(|_, t| t.expires_at > now);
        Ok((before - tokens.len()) as u64)
    }
}

#[async_trait]
impl PaymentsRepository for MemoryStore {
    async fn payments_create(&self, tx: &mut Self::Tx, payment: &NewPayment) -> AppResult<Payment> {
        self.check(FailPoint::CreatePayment)?;
        let tables = &mut *tx.tables;
        let row = Payment {
            id: next_id(&mut tables.sequences.payments),
            user_id: payment.user_id,
            rental_id: payment.rental_id,
            amount: payment.amount,
            kind: payment.kind.clone(),
            created_at: payment.created_at,
        };
        tables.payments.insert(row.id, row.clone());
        Ok(row)
    }

    async fn payments_list_for_user(
        &self,
        tx: &mut Self::Tx,
        user_id: i32,
    ) -> AppResult<Vec<Payment>> {
        let mut payments: Vec<Payment> = tx
            .tables
            .payments
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(payments)
    }

    async fn payments_delete_for_user(&self, tx: &mut Self::Tx, user_id: i32) -> AppResult<u64> {
        let payments = &mut tx.tables.payments;
        let before = payments.len();
        payments.retain(|_, p| p.user_id != user_id);
        Ok((before - payments.len()) as u64)
    }
}
