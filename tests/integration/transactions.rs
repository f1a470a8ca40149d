//! Coordinator guarantees: rollback on error, panic, fault, deadline and cancellation

use std::time::Duration;

use shelfkeeper_server::{
    error::{AppError, ErrorKind},
    models::{user::NewUser, Role},
    repository::{memory::FailPoint, UsersRepository},
};

use crate::common::TestApp;

fn new_user(login: &str) -> NewUser {
    NewUser {
        login: login.to_string(),
        password: None,
        firstname: None,
        lastname: None,
        email: None,
        role: Role::User,
    }
}

async fn exists(app: &TestApp, login: &'static str) -> bool {
    let store = app.store.clone();
    app.services
        .coordinator
        .read_only(move |tx| Box::pin(async move { store.users_get_by_login(tx, login).await }))
        .await
        .unwrap()
        .is_some()
}

#[tokio::test]
#[allow(unreachable_code)]
async fn panic_rolls_back_and_resumes() {
    let app = TestApp::new();
    let coordinator = app.services.coordinator.clone();
    let store = app.store.clone();

    let handle = tokio::spawn(async move {
        coordinator
            .run(move |tx| {
                Box::pin(async move {
                    store.users_create(tx, &new_user("ghost")).await?;
                    panic!("unit of work blew up");
                    Ok::<_, AppError>(())
                })
            })
            .await
    });

    let err = handle.await.expect_err("panic propagates to the task");
    assert!(err.is_panic());
    assert!(!exists(&app, "ghost").await);

    // The store is usable again afterwards
    app.user("after", Role::User).await;
    assert!(exists(&app, "after").await);
}

#[tokio::test]
async fn begin_failure_does_nothing() {
    let app = TestApp::new();
    app.store.fail_next(FailPoint::Begin);
    let store = app.store.clone();

    let err = app
        .services
        .coordinator
        .run(move |tx| Box::pin(async move { store.users_create(tx, &new_user("ghost")).await }))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransactionFailure);
    assert!(!exists(&app, "ghost").await);
}

#[tokio::test]
async fn commit_failure_leaves_no_trace() {
    let app = TestApp::new();
    app.store.fail_next(FailPoint::Commit);
    let store = app.store.clone();

    let err = app
        .services
        .coordinator
        .run(move |tx| Box::pin(async move { store.users_create(tx, &new_user("ghost")).await }))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Transaction(_)));
    assert!(!exists(&app, "ghost").await);
}

#[tokio::test]
async fn deadline_elapsing_rolls_back() {
    let app = TestApp::new();
    let store = app.store.clone();

    let err = app
        .services
        .coordinator
        .run_with_deadline(Duration::from_millis(50), move |tx| {
            Box::pin(async move {
                store.users_create(tx, &new_user("slow")).await?;
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, AppError>(())
            })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Timeout(d) if d == Duration::from_millis(50)));
    assert!(!exists(&app, "slow").await);
}

#[tokio::test]
async fn cancelled_caller_rolls_back() {
    let app = TestApp::new();
    let coordinator = app.services.coordinator.clone();
    let store = app.store.clone();

    let cancelled = tokio::time::timeout(
        Duration::from_millis(50),
        coordinator.run(move |tx| {
            Box::pin(async move {
                store.users_create(tx, &new_user("abandoned")).await?;
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, AppError>(())
            })
        }),
    )
    .await;

    assert!(cancelled.is_err());
    assert!(!exists(&app, "abandoned").await);
}

#[tokio::test]
async fn errors_propagate_unchanged() {
    let app = TestApp::new();
    let store = app.store.clone();

    let err = app
        .services
        .coordinator
        .run(move |tx| {
            Box::pin(async move {
                store.users_create(tx, &new_user("ghost")).await?;
                Err::<(), _>(AppError::RentalNotActive(12))
            })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::RentalNotActive(12)));
    assert!(!exists(&app, "ghost").await);
}
