//! Book ownership rules, transfers and cascading user deletion

use chrono::Duration;

use shelfkeeper_server::{
    error::{AppError, ErrorKind},
    models::{
        book::{CreateBook, UpdateBook},
        user::CascadeReport,
        Role, TokenType,
    },
    repository::memory::FailPoint,
};

use crate::common::TestApp;

fn create_book(isbn: &str, owner_id: Option<i32>) -> CreateBook {
    CreateBook {
        isbn: isbn.to_string(),
        title: "Dune".to_string(),
        author: Some("Frank Herbert".to_string()),
        copies: None,
        owner_id,
    }
}

#[tokio::test]
async fn only_admins_choose_the_owner() {
    let app = TestApp::new();
    let (admin, admin_p) = app.principal("admin", Role::Admin).await;
    let (reader, reader_p) = app.principal("reader", Role::User).await;
    let (other, _) = app.principal("other", Role::User).await;
    let books = &app.services.books;

    let own = books
        .create(&reader_p, create_book("9780441013593", Some(other.id)))
        .await
        .unwrap();
    assert_eq!(own.owner_id, reader.id);
    assert_eq!(own.available_copies, 1);

    let assigned = books
        .create(&admin_p, create_book("9780441172719", Some(other.id)))
        .await
        .unwrap();
    assert_eq!(assigned.owner_id, other.id);

    let err = books
        .create(&admin_p, create_book("9780441013593", None))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // An admin update without an owner takes the book over
    let updated = books
        .update(
            &admin_p,
            assigned.id,
            UpdateBook {
                isbn: None,
                title: Some("Children of Dune".to_string()),
                author: None,
                owner_id: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.owner_id, admin.id);
    assert_eq!(updated.title, "Children of Dune");
    assert_eq!(updated.author.as_deref(), Some("Frank Herbert"));

    let err = books
        .update(
            &reader_p,
            updated.id,
            UpdateBook {
                isbn: None,
                title: Some("Mine now".to_string()),
                author: None,
                owner_id: Some(reader.id),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn invalid_book_requests_are_rejected() {
    let app = TestApp::new();
    let (_, reader_p) = app.principal("reader", Role::User).await;

    let err = app
        .services
        .books
        .create(&reader_p, create_book("123", None))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn readers_transfer_only_their_books_to_readers() {
    let app = TestApp::new();
    let (alice, alice_p) = app.principal("alice", Role::User).await;
    let (bob, _) = app.principal("bob", Role::User).await;
    let (librarian, _) = app.principal("librarian", Role::Librarian).await;
    let (_, admin_p) = app.principal("admin", Role::Admin).await;
    let book = app.book(alice.id, 1).await;
    let books = &app.services.books;

    let err = books
        .transfer_ownership(&alice_p, book.id, alice.id, librarian.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = books
        .transfer_ownership(&alice_p, book.id, alice.id, 4242)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TargetUserNotFound(4242)));

    let moved = books
        .transfer_ownership(&alice_p, book.id, alice.id, bob.id)
        .await
        .unwrap();
    assert_eq!(moved.owner_id, bob.id);

    // Alice no longer owns it
    let err = books
        .transfer_ownership(&alice_p, book.id, alice.id, bob.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotOwner { user_id, .. } if user_id == alice.id));

    let err = books
        .transfer_ownership(&alice_p, book.id, bob.id, alice.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let moved = books
        .transfer_ownership(&admin_p, book.id, bob.id, librarian.id)
        .await
        .unwrap();
    assert_eq!(moved.owner_id, librarian.id);

    let err = books
        .transfer_ownership(&admin_p, 4242, bob.id, alice.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BookNotFound(4242)));
}

#[tokio::test]
async fn cascade_removes_everything_owned() {
    let app = TestApp::new();
    let owner = app.user("owner", Role::User).await;
    let reader = app.user("reader", Role::User).await;
    let book = app.book(owner.id, 1).await;
    let kept = app.book(reader.id, 1).await;
    let rentals = &app.services.rentals;

    // Late returns on both sides leave history and a payment
    let on_owned = rentals
        .create(reader.id, book.id, app.clock_now() + Duration::days(1))
        .await
        .unwrap();
    let by_owner = rentals
        .create(owner.id, kept.id, app.clock_now() + Duration::days(1))
        .await
        .unwrap();
    app.clock.advance(Duration::days(3));
    rentals.return_rental(on_owned.id).await.unwrap();
    rentals.return_rental(by_owner.id).await.unwrap();
    let (access, _) = app.tokens(owner.id).await;

    let report = app.services.users.cascade_delete(owner.id).await.unwrap();
    assert_eq!(
        report,
        CascadeReport {
            user_id: owner.id,
            payments_deleted: 1,
            rentals_deleted: 2,
            books_deleted: 1,
            tokens_deleted: 2,
        }
    );

    assert!(!app.user_exists(owner.id).await);
    assert!(app.services.tokens.find(&access.token_value).await.unwrap().is_none());
    assert!(matches!(
        app.services.books.get(book.id).await.unwrap_err(),
        AppError::BookNotFound(_)
    ));

    // The other reader keeps their book and their own fee, detached from
    // the deleted rental
    assert_eq!(app.available(kept.id).await, 1);
    let payments = app.payments(reader.id).await;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].rental_id, None);
}

#[tokio::test]
async fn cascade_refuses_admins_and_active_rentals() {
    let app = TestApp::new();
    let admin = app.user("admin", Role::Admin).await;
    let owner = app.user("owner", Role::User).await;
    let reader = app.user("reader", Role::User).await;
    let book = app.book(owner.id, 1).await;
    let users = &app.services.users;

    assert!(matches!(
        users.cascade_delete(admin.id).await.unwrap_err(),
        AppError::CannotDeleteAdmin
    ));
    assert!(matches!(
        users.cascade_delete(4242).await.unwrap_err(),
        AppError::UserNotFound(4242)
    ));

    app.services
        .rentals
        .create(reader.id, book.id, app.services.rentals.default_due_date())
        .await
        .unwrap();

    for user_id in [owner.id, reader.id] {
        let err = users.cascade_delete(user_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(app.user_exists(user_id).await);
    }
}

#[tokio::test]
async fn cascade_failure_rolls_everything_back() {
    let app = TestApp::new();
    let owner = app.user("owner", Role::User).await;
    let book = app.book(owner.id, 1).await;
    let rentals = &app.services.rentals;
    let rental = rentals
        .create(owner.id, book.id, rentals.default_due_date())
        .await
        .unwrap();
    rentals.return_rental(rental.id).await.unwrap();
    let (access, _) = app.tokens(owner.id).await;

    app.store.fail_next(FailPoint::DeleteTokens);
    let err = app.services.users.cascade_delete(owner.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransactionFailure);

    assert!(app.user_exists(owner.id).await);
    assert_eq!(app.available(book.id).await, 1);
    assert_eq!(app.rental_count(owner.id).await, 1);
    assert!(app
        .services
        .session
        .authenticate(&access.token_value, TokenType::Access)
        .await
        .is_ok());
}
