//! API integration tests against a running server
//!
//! These expect a server on localhost:8080 with an `admin`/`admin` account.

use reqwest::Client;
use serde_json::{json, Value};
use uuid::Uuid;

const BASE_URL: &str = "http://localhost:8080/api/v1";

/// Helper to log in and return the token pair
async fn login(client: &Client, login: &str, password: &str) -> Value {
    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "login": login,
            "password": password
        }))
        .send()
        .await
        .expect("Failed to send login request");

    assert!(response.status().is_success());
    response.json().await.expect("Failed to parse login response")
}

/// Helper to get an admin access token
async fn get_auth_token(client: &Client) -> String {
    let body = login(client, "admin", "admin").await;
    body["access_token"]
        .as_str()
        .expect("No access token in response")
        .to_string()
}

/// Register a throwaway reader and return (id, access token)
async fn register_reader(client: &Client) -> (i64, String) {
    let name = format!("reader{}", &Uuid::new_v4().simple().to_string()[..8]);

    let response = client
        .post(format!("{}/auth/register", BASE_URL))
        .json(&json!({
            "login": name,
            "password": "readerpass",
            "firstname": "Test",
            "lastname": "Reader"
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.expect("Failed to parse response");
    let id = body["id"].as_i64().expect("No user ID");
    let token = login(client, &name, "readerpass").await["access_token"]
        .as_str()
        .expect("No access token in response")
        .to_string();
    (id, token)
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_login() {
    let client = Client::new();
    let body = login(&client, "admin", "admin").await;

    assert!(body["access_token"].is_string());
    assert!(body["refresh_token"].is_string());
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 900);
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "login": "admin",
            "password": "wrong"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_get_current_user() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    let response = client
        .get(format!("{}/auth/me", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["login"], "admin");
    assert_eq!(body["role"], "admin");
    assert!(body.get("password").is_none());
}

#[tokio::test]
#[ignore]
async fn test_refresh_rotates_and_logout_revokes() {
    let client = Client::new();
    let pair = login(&client, "admin", "admin").await;
    let refresh = pair["refresh_token"].as_str().unwrap();

    let response = client
        .post(format!("{}/auth/refresh", BASE_URL))
        .header("Authorization", format!("Bearer {}", refresh))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let rotated: Value = response.json().await.expect("Failed to parse response");

    // The old refresh token is spent
    let response = client
        .post(format!("{}/auth/refresh", BASE_URL))
        .header("Authorization", format!("Bearer {}", refresh))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 401);

    let access = rotated["access_token"].as_str().unwrap();
    let response = client
        .post(format!("{}/auth/logout", BASE_URL))
        .header("Authorization", format!("Bearer {}", access))
        .json(&json!({ "refresh_token": rotated["refresh_token"] }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 204);

    let response = client
        .get(format!("{}/auth/me", BASE_URL))
        .header("Authorization", format!("Bearer {}", access))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_book_rental_cycle() {
    let client = Client::new();
    let token = get_auth_token(&client).await;
    let (reader_id, reader_token) = register_reader(&client).await;
    let isbn = format!("978{}", &Uuid::new_v4().as_u128().to_string()[..10]);

    // Create book
    let response = client
        .post(format!("{}/books", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({
            "isbn": isbn,
            "title": "Test Book",
            "author": "Test Author",
            "copies": 1
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    let book: Value = response.json().await.expect("Failed to parse response");
    let book_id = book["id"].as_i64().expect("No book ID");

    // Rent it as the reader
    let response = client
        .post(format!("{}/rentals", BASE_URL))
        .header("Authorization", format!("Bearer {}", reader_token))
        .json(&json!({ "book_id": book_id }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    let rental: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(rental["user_id"], reader_id);
    assert_eq!(rental["status"], "active");
    let rental_id = rental["id"].as_i64().expect("No rental ID");

    // No copies left
    let response = client
        .post(format!("{}/rentals", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({ "book_id": book_id }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);

    let response = client
        .post(format!("{}/rentals/{}/extend", BASE_URL, rental_id))
        .header("Authorization", format!("Bearer {}", reader_token))
        .json(&json!({ "additional_days": 7 }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let response = client
        .post(format!("{}/rentals/{}/return", BASE_URL, rental_id))
        .header("Authorization", format!("Bearer {}", reader_token))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let returned: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(returned["rental"]["status"], "returned");
    assert_eq!(returned["late_days"], 0);

    // Cleanup: the reader goes, the book stays with the admin
    let response = client
        .delete(format!("{}/users/{}", BASE_URL, reader_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let report: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(report["rentals_deleted"], 1);
}

#[tokio::test]
#[ignore]
async fn test_reader_cannot_list_overdue() {
    let client = Client::new();
    let (_, reader_token) = register_reader(&client).await;

    let response = client
        .get(format!("{}/rentals/overdue", BASE_URL))
        .header("Authorization", format!("Bearer {}", reader_token))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 403);
}

#[tokio::test]
#[ignore]
async fn test_register_login_ignores_case() {
    let client = Client::new();
    let name = format!("Casey{}", &Uuid::new_v4().simple().to_string()[..8]);

    let mut statuses = Vec::new();
    for login in [name.to_lowercase(), name.to_uppercase()] {
        let response = client
            .post(format!("{}/auth/register", BASE_URL))
            .json(&json!({
                "login": login,
                "password": "readerpass"
            }))
            .send()
            .await
            .expect("Failed to send request");
        statuses.push(response.status());
    }

    assert_eq!(statuses[0], 201);
    assert_eq!(statuses[1], 409);
}

#[tokio::test]
#[ignore]
async fn test_list_books() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    let response = client
        .get(format!("{}/books?available_only=true", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body.is_array());
}

#[tokio::test]
#[ignore]
async fn test_unauthorized_access() {
    let client = Client::new();

    let response = client
        .get(format!("{}/rentals/overdue", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}
