#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, Response, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use skillswap_server::{
    app,
    config::{AccessPolicy, Config, TransitionPolicy},
    db::Database,
    AppState,
};

pub const PASSWORD: &str = "violet-harbor-42";

pub async fn spawn_app() -> Router {
    spawn_app_with(Config::default()).await
}

pub async fn spawn_open_app() -> Router {
    spawn_app_with(Config {
        access_policy: AccessPolicy::Open,
        status_transitions: TransitionPolicy::Free,
        ..Config::default()
    })
    .await
}

pub async fn spawn_app_with(config: Config) -> Router {
    let db = Database::in_memory().await.expect("in-memory database");
    db.run_migrations().await.expect("migrations");
    app(AppState { db, config })
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.expect("infallible router")
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    }
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

/// Sends a JSON request authenticated with a bearer token.
pub async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("valid request");

    let response = send(app, request).await;
    let status = response.status();
    (status, body_json(response).await)
}

pub async fn post_form(app: &Router, uri: &str, form: &str, cookie: Option<&str>) -> Response<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    send(app, builder.body(Body::from(form.to_string())).expect("valid request")).await
}

pub async fn get_page(app: &Router, uri: &str, cookie: Option<&str>) -> Response<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    send(app, builder.body(Body::empty()).expect("valid request")).await
}

/// `name=value` pair of the session cookie set by a response, if any.
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("sessionid="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

pub struct TestUser {
    pub id: i64,
    pub token: String,
}

pub async fn register(app: &Router, username: &str) -> TestUser {
    let (status, body) = call(
        app,
        Method::POST,
        "/auth/register",
        None,
        Some(serde_json::json!({
            "username": username,
            "password": PASSWORD,
            "email": format!("{username}@example.com"),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register {username}: {body}");

    TestUser {
        id: body["user"]["id"].as_i64().expect("user id"),
        token: body["token"].as_str().expect("token").to_string(),
    }
}

pub async fn create_skill(app: &Router, token: &str, name: &str) -> i64 {
    let (status, body) = call(
        app,
        Method::POST,
        "/skills/",
        Some(token),
        Some(serde_json::json!({ "name": name })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create skill {name}: {body}");
    body["id"].as_i64().expect("skill id")
}

pub async fn create_swap(app: &Router, token: &str, receiver: i64, offered: i64, requested: i64) -> i64 {
    let (status, body) = call(
        app,
        Method::POST,
        "/swap-requests/",
        Some(token),
        Some(serde_json::json!({
            "receiver": receiver,
            "offered_skill": offered,
            "requested_skill": requested,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create swap: {body}");
    body["id"].as_i64().expect("swap id")
}
