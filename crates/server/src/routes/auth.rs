// Token API for non-browser clients. Tokens are the same opaque sessions the
// HTML pages keep in the `sessionid` cookie.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    db::models::UserSummary,
    error::Result,
    extractors::ValidatedJson,
    middleware::auth::AuthUser,
    services::identity::Session,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

/// Routes that need an authenticated caller; mounted behind the auth layer.
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me).delete(delete_account))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: String,
    pub user: UserSummary,
}

impl From<Session> for AuthResponse {
    fn from(session: Session) -> Self {
        Self {
            token: session.token,
            expires_at: session.expires_at.to_rfc3339(),
            user: session.user,
        }
    }
}

async fn register(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let identity = state.identity();
    let user = identity
        .create_account(
            &body.username,
            &body.password,
            body.email.as_deref().unwrap_or_default(),
        )
        .await?;
    let session = identity.open_session(user).await?;

    Ok((StatusCode::CREATED, Json(session.into())))
}

async fn login(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let session = state.identity().login(&body.username, &body.password).await?;
    Ok(Json(session.into()))
}

async fn logout(State(state): State<AppState>, user: AuthUser) -> Result<StatusCode> {
    state.identity().invalidate(&user.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn me(user: AuthUser) -> Json<UserSummary> {
    Json(UserSummary {
        id: user.id,
        username: user.username,
        email: user.email,
    })
}

async fn delete_account(State(state): State<AppState>, user: AuthUser) -> Result<StatusCode> {
    state.identity().delete_account(user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
