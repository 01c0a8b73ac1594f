mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use serde_json::json;

use common::*;

#[tokio::test]
async fn register_login_me_logout() {
    let app = spawn_app().await;
    let alice = register(&app, "alice").await;

    let (status, me) = call(&app, Method::GET, "/auth/me", Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        me,
        json!({ "id": alice.id, "username": "alice", "email": "alice@example.com" })
    );

    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "username": "alice", "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let second = body["token"].as_str().unwrap().to_string();
    assert_ne!(second, alice.token);
    assert!(body["expires_at"].is_string());

    let (status, _) = call(&app, Method::POST, "/auth/logout", Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, Method::GET, "/auth/me", Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Other sessions stay alive.
    let (status, _) = call(&app, Method::GET, "/auth/me", Some(&second), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let app = spawn_app().await;
    register(&app, "alice").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "username": "alice", "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["message"], "A user with that username already exists.");
}

#[tokio::test]
async fn weak_credentials_are_rejected_per_field() {
    let app = spawn_app().await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "username": "bad name", "password": "12345678" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["fields"]["username"].is_array());
    assert!(body["error"]["fields"]["password"].is_array());

    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "username": "dana", "password": PASSWORD, "email": "not-an-email" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["fields"]["email"].is_array());
}

#[tokio::test]
async fn login_failures_are_generic() {
    let app = spawn_app().await;
    register(&app, "alice").await;

    let (wrong_status, wrong) = call(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "guess-guess" })),
    )
    .await;
    let (unknown_status, unknown) = call(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "username": "nobody", "password": "guess-guess" })),
    )
    .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong, unknown);
    assert_eq!(wrong["error"]["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn health_is_public() {
    let app = spawn_app().await;
    let response = get_page(&app, "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");
}

#[tokio::test]
async fn stale_cookie_does_not_shadow_a_valid_bearer_token() {
    let app = spawn_app().await;
    let alice = register(&app, "alice").await;

    let request = Request::builder()
        .uri("/auth/me")
        .header(header::COOKIE, "sessionid=long-gone")
        .header(header::AUTHORIZATION, format!("Bearer {}", alice.token))
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["username"], "alice");

    // And the other way round: a stale bearer header falls back to the cookie.
    let request = Request::builder()
        .uri("/auth/me")
        .header(header::COOKIE, format!("sessionid={}", alice.token))
        .header(header::AUTHORIZATION, "Bearer long-gone")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
}
