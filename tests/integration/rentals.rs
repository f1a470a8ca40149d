//! Rental lifecycle: availability, oversell, returns, fees and extensions

use chrono::Duration;
use rust_decimal::Decimal;

use shelfkeeper_server::{
    error::{AppError, ErrorKind},
    models::{payment::LATE_FEE, rental::ExtendBy, Role, RentalStatus},
    repository::memory::FailPoint,
};

use crate::common::TestApp;

#[tokio::test]
async fn create_and_return_move_availability() {
    let app = TestApp::new();
    let owner = app.user("owner", Role::User).await;
    let reader = app.user("reader", Role::User).await;
    let book = app.book(owner.id, 2).await;
    let rentals = &app.services.rentals;

    let rental = rentals
        .create(reader.id, book.id, app.clock_now() + Duration::days(14))
        .await
        .unwrap();
    assert_eq!(rental.status, RentalStatus::Active);
    assert_eq!(rental.user_name, "reader Tester");
    assert_eq!(rental.book_title, book.title);
    assert_eq!(app.available(book.id).await, 1);

    let returned = rentals.return_rental(rental.id).await.unwrap();
    assert_eq!(returned.rental.status, RentalStatus::Returned);
    assert_eq!(returned.rental.return_date, Some(app.clock_now()));
    assert_eq!(returned.late_days, 0);
    assert_eq!(returned.fee, Some(Decimal::ZERO));
    assert_eq!(app.available(book.id).await, 2);
    assert!(app.payments(reader.id).await.is_empty());
}

#[tokio::test]
async fn second_return_is_rejected_without_touching_copies() {
    let app = TestApp::new();
    let owner = app.user("owner", Role::User).await;
    let book = app.book(owner.id, 1).await;
    let rentals = &app.services.rentals;

    let rental = rentals
        .create(owner.id, book.id, rentals.default_due_date())
        .await
        .unwrap();
    rentals.return_rental(rental.id).await.unwrap();

    let err = rentals.return_rental(rental.id).await.unwrap_err();
    assert!(matches!(err, AppError::RentalNotActive(id) if id == rental.id));
    assert_eq!(app.available(book.id).await, 1);

    let err = rentals.return_rental(9999).await.unwrap_err();
    assert!(matches!(err, AppError::RentalNotFound(9999)));
}

#[tokio::test]
async fn concurrent_creates_never_oversell() {
    let app = TestApp::new();
    let owner = app.user("owner", Role::User).await;
    let book = app.book(owner.id, 3).await;

    let mut readers = Vec::new();
    for i in 0..10 {
        readers.push(app.user(&format!("reader{}", i), Role::User).await);
    }

    let due = app.services.rentals.default_due_date();
    let mut handles = Vec::new();
    for reader in &readers {
        let rentals = app.services.rentals.clone();
        let (user_id, book_id) = (reader.id, book.id);
        handles.push(tokio::spawn(async move {
            rentals.create(user_id, book_id, due).await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::Unavailable),
        }
    }

    assert_eq!(created, 3);
    assert_eq!(app.available(book.id).await, 0);
}

#[tokio::test]
async fn create_checks_its_inputs() {
    let app = TestApp::new();
    let owner = app.user("owner", Role::User).await;
    let book = app.book(owner.id, 1).await;
    let rentals = &app.services.rentals;
    let due = rentals.default_due_date();

    let err = rentals.create(owner.id, book.id, app.clock_now()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = rentals.create(4242, book.id, due).await.unwrap_err();
    assert!(matches!(err, AppError::UserNotFound(4242)));

    let err = rentals.create(owner.id, 4242, due).await.unwrap_err();
    assert!(matches!(err, AppError::BookNotFound(4242)));

    assert_eq!(app.available(book.id).await, 1);
}

#[tokio::test]
async fn failed_insert_restores_the_copy() {
    let app = TestApp::new();
    let owner = app.user("owner", Role::User).await;
    let book = app.book(owner.id, 1).await;
    let rentals = &app.services.rentals;

    app.store.fail_next(FailPoint::CreateRental);
    let err = rentals
        .create(owner.id, book.id, rentals.default_due_date())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransactionFailure);
    assert_eq!(app.available(book.id).await, 1);
    assert_eq!(app.rental_count(owner.id).await, 0);
}

#[tokio::test]
async fn failed_increment_keeps_the_rental_active() {
    let app = TestApp::new();
    let owner = app.user("owner", Role::User).await;
    let book = app.book(owner.id, 1).await;
    let rentals = &app.services.rentals;
    let rental = rentals
        .create(owner.id, book.id, rentals.default_due_date())
        .await
        .unwrap();

    app.store.fail_next(FailPoint::IncrementAvailable);
    assert!(rentals.return_rental(rental.id).await.is_err());

    assert_eq!(rentals.get(rental.id).await.unwrap().status, RentalStatus::Active);
    assert_eq!(app.available(book.id).await, 0);
}

#[tokio::test]
async fn late_return_charges_per_whole_day() {
    let app = TestApp::new();
    let owner = app.user("owner", Role::User).await;
    let reader = app.user("reader", Role::User).await;
    let book = app.book(owner.id, 1).await;
    let rentals = &app.services.rentals;

    let rental = rentals
        .create(reader.id, book.id, app.clock_now() + Duration::days(14))
        .await
        .unwrap();

    app.clock.advance(Duration::days(19) + Duration::hours(6));
    assert_eq!(rentals.get(rental.id).await.unwrap().status, RentalStatus::Overdue);

    let returned = rentals.return_rental(rental.id).await.unwrap();
    assert_eq!(returned.late_days, 5);
    assert_eq!(returned.fee, Some(Decimal::new(250, 2)));
    assert_eq!(returned.rental.status, RentalStatus::Returned);

    let payments = app.payments(reader.id).await;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].amount, Decimal::new(250, 2));
    assert_eq!(payments[0].rental_id, Some(rental.id));
    assert_eq!(payments[0].kind, LATE_FEE);
}

#[tokio::test]
async fn fee_recording_failure_keeps_the_return() {
    let app = TestApp::new();
    let owner = app.user("owner", Role::User).await;
    let book = app.book(owner.id, 1).await;
    let rentals = &app.services.rentals;
    let rental = rentals
        .create(owner.id, book.id, app.clock_now() + Duration::days(1))
        .await
        .unwrap();

    app.clock.advance(Duration::days(4));
    app.store.fail_next(FailPoint::CreatePayment);

    let returned = rentals.return_rental(rental.id).await.unwrap();
    assert_eq!(returned.late_days, 3);
    assert_eq!(returned.fee, None);
    assert_eq!(app.available(book.id).await, 1);
    assert!(app.payments(owner.id).await.is_empty());
}

#[tokio::test]
async fn extend_moves_the_due_date_of_active_rentals() {
    let app = TestApp::new();
    let owner = app.user("owner", Role::User).await;
    let book = app.book(owner.id, 1).await;
    let rentals = &app.services.rentals;
    let due = app.clock_now() + Duration::days(2);
    let rental = rentals.create(owner.id, book.id, due).await.unwrap();

    // Overdue rentals can still be extended
    app.clock.advance(Duration::days(3));
    assert_eq!(rentals.list_overdue().await.unwrap().len(), 1);

    let extended = rentals
        .extend(rental.id, ExtendBy::AdditionalDays(7))
        .await
        .unwrap();
    assert_eq!(extended.due_date, due + Duration::days(7));
    assert_eq!(extended.status, RentalStatus::Active);
    assert!(rentals.list_overdue().await.unwrap().is_empty());

    let target = app.clock_now() + Duration::days(30);
    let extended = rentals
        .extend(rental.id, ExtendBy::NewDueDate(target))
        .await
        .unwrap();
    assert_eq!(extended.due_date, target);
}

#[tokio::test]
async fn extend_distinguishes_missing_from_returned() {
    let app = TestApp::new();
    let owner = app.user("owner", Role::User).await;
    let book = app.book(owner.id, 1).await;
    let rentals = &app.services.rentals;
    let rental = rentals
        .create(owner.id, book.id, rentals.default_due_date())
        .await
        .unwrap();
    rentals.return_rental(rental.id).await.unwrap();

    let err = rentals
        .extend(rental.id, ExtendBy::AdditionalDays(3))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::RentalNotActive(_)));

    let err = rentals
        .extend(9999, ExtendBy::AdditionalDays(3))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::RentalNotFound(9999)));

    for by in [
        ExtendBy::AdditionalDays(0),
        ExtendBy::AdditionalDays(366),
        ExtendBy::NewDueDate(app.clock_now() - Duration::days(1)),
    ] {
        let err = rentals.extend(rental.id, by).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}

#[tokio::test]
async fn extend_never_shortens_the_loan() {
    let app = TestApp::new();
    let owner = app.user("owner", Role::User).await;
    let book = app.book(owner.id, 1).await;
    let rentals = &app.services.rentals;
    let due = app.clock_now() + Duration::days(14);
    let rental = rentals.create(owner.id, book.id, due).await.unwrap();

    for earlier in [app.clock_now() + Duration::days(1), due] {
        let err = rentals
            .extend(rental.id, ExtendBy::NewDueDate(earlier))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
    assert_eq!(rentals.get(rental.id).await.unwrap().due_date, due);
}

#[tokio::test]
async fn delete_is_a_plain_hard_delete() {
    let app = TestApp::new();
    let owner = app.user("owner", Role::User).await;
    let book = app.book(owner.id, 1).await;
    let rentals = &app.services.rentals;
    let rental = rentals
        .create(owner.id, book.id, rentals.default_due_date())
        .await
        .unwrap();

    rentals.delete(rental.id).await.unwrap();
    assert!(matches!(
        rentals.get(rental.id).await.unwrap_err(),
        AppError::RentalNotFound(_)
    ));
    assert_eq!(app.available(book.id).await, 0);

    let err = rentals.delete(rental.id).await.unwrap_err();
    assert!(matches!(err, AppError::RentalNotFound(_)));
}
