//! Shared fixture: services over the in-process store and a manual clock

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use shelfkeeper_server::{
    clock::{Clock, ManualClock},
    config::AppConfig,
    models::{
        book::NewBook,
        payment::Payment,
        token::IssuedToken,
        user::NewUser,
        Book, Principal, Role, User,
    },
    repository::{
        BooksRepository, MemoryStore, PaymentsRepository, RentalsRepository, UsersRepository,
    },
    services::Services,
};

pub struct TestApp {
    pub store: MemoryStore,
    pub clock: Arc<ManualClock>,
    pub config: AppConfig,
    pub services: Services<MemoryStore>,
    isbn_seq: AtomicUsize,
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

impl TestApp {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let clock = Arc::new(ManualClock::new(start()));
        let config = AppConfig::default();
        let services = Services::new(store.clone(), &config, clock.clone());

        Self {
            store,
            clock,
            config,
            services,
            isbn_seq: AtomicUsize::new(0),
        }
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Insert a user directly; it has no password and cannot log in
    pub async fn user(&self, login: &str, role: Role) -> User {
        let store = self.store.clone();
        let user = NewUser {
            login: login.to_string(),
            password: None,
            firstname: Some(login.to_string()),
            lastname: Some("Tester".to_string()),
            email: Some(format!("{}@example.org", login)),
            role,
        };

        self.services
            .coordinator
            .run(move |tx| Box::pin(async move { store.users_create(tx, &user).await }))
            .await
            .expect("create user")
    }

    pub async fn principal(&self, login: &str, role: Role) -> (User, Principal) {
        let user = self.user(login, role).await;
        let principal = Principal::new(user.id, user.role);
        (user, principal)
    }

    pub async fn book(&self, owner_id: i32, copies: i32) -> Book {
        let n = self.isbn_seq.fetch_add(1, Ordering::SeqCst);
        let store = self.store.clone();
        let book = NewBook {
            owner_id,
            isbn: format!("978000000{:04}", n),
            title: format!("Book {}", n),
            author: Some("A. Writer".to_string()),
            available_copies: copies,
        };

        self.services
            .coordinator
            .run(move |tx| Box::pin(async move { store.books_create(tx, &book).await }))
            .await
            .expect("create book")
    }

    pub async fn available(&self, book_id: i32) -> i32 {
        self.services
            .books
            .get(book_id)
            .await
            .expect("book exists")
            .available_copies
    }

    pub async fn user_exists(&self, user_id: i32) -> bool {
        let store = self.store.clone();
        self.services
            .coordinator
            .read_only(move |tx| Box::pin(async move { store.users_get_by_id(tx, user_id).await }))
            .await
            .expect("lookup user")
            .is_some()
    }

    pub async fn rental_count(&self, user_id: i32) -> usize {
        let store = self.store.clone();
        self.services
            .coordinator
            .read_only(move |tx| {
                Box::pin(async move { store.rentals_list_for_user(tx, user_id).await })
            })
            .await
            .expect("list rentals")
            .len()
    }

    pub async fn payments(&self, user_id: i32) -> Vec<Payment> {
        let store = self.store.clone();
        self.services
            .coordinator
            .read_only(move |tx| {
                Box::pin(async move { store.payments_list_for_user(tx, user_id).await })
            })
            .await
            .expect("list payments")
    }

    /// Issue an access + refresh pair without going through a password login
    pub async fn tokens(&self, user_id: i32) -> (IssuedToken, IssuedToken) {
        let ledger = self.services.tokens.clone();
        self.services
            .coordinator
            .run(move |tx| Box::pin(async move { ledger.issue_pair_in(tx, user_id).await }))
            .await
            .expect("issue tokens")
    }
}
