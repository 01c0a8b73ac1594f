use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    extract::cookie::{Cookie, CookieJar, SameSite},
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::{error::AppError, AppState};

pub const SESSION_COOKIE: &str = "sessionid";

#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Session token the request was authenticated with.
    pub token: String,
}

pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

/// Candidate tokens in the order they are tried: an explicit bearer header
/// first, then the session cookie.
pub fn session_tokens(
    jar: &CookieJar,
    bearer: Option<&TypedHeader<Authorization<Bearer>>>,
) -> Vec<String> {
    bearer
        .map(|TypedHeader(auth)| auth.token().to_string())
        .into_iter()
        .chain(jar.get(SESSION_COOKIE).map(|c| c.value().to_string()))
        .filter(|token| !token.is_empty())
        .collect()
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = state.identity();
    let mut user = None;
    for token in session_tokens(&jar, bearer.as_ref()) {
        user = identity.current_user(&token).await?;
        if user.is_some() {
            break;
        }
    }
    let user = user.ok_or(AppError::Unauthorized)?;

    tracing::debug!(user_id = user.id, "request authenticated");
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

// Extractor for getting the authenticated user from request extensions
#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_header_is_tried_before_the_cookie() {
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, "from-cookie"));
        let bearer = TypedHeader(Authorization::bearer("from-header").unwrap());

        assert_eq!(
            session_tokens(&jar, Some(&bearer)),
            vec!["from-header".to_string(), "from-cookie".to_string()]
        );
        assert_eq!(session_tokens(&jar, None), vec!["from-cookie".to_string()]);
        assert!(session_tokens(&CookieJar::new(), None).is_empty());
    }

    #[test]
    fn blank_cookie_is_ignored() {
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, ""));
        assert!(session_tokens(&jar, None).is_empty());
    }
}
