//! Browser pages: signup, login, logout and the dashboard.
//!
//! Sessions travel in the `sessionid` cookie. Invalid submissions redisplay
//! the form with inline errors; login failures never say which field was
//! wrong.

use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use axum_extra::extract::cookie::CookieJar;
use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::Deserialize;

use crate::{
    error::{AppError, FieldErrors, Result},
    middleware::auth::{expired_session_cookie, session_cookie, SESSION_COOKIE},
    services::password::password_problems,
    AppState,
};

const LOGIN_URL: &str = "/login/";
const INVALID_LOGIN: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";
const REQUIRED: &str = "This field is required.";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard))
        .route("/signup/", get(signup_page).post(signup))
        .route("/login/", get(login_page).post(login))
        .route("/logout/", post(logout))
}

#[derive(Debug, Default, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

async fn dashboard(State(state): State<AppState>, jar: CookieJar) -> Result<Response> {
    let user = match jar.get(SESSION_COOKIE) {
        Some(cookie) => state.identity().current_user(cookie.value()).await?,
        None => None,
    };

    let Some(user) = user else {
        return Ok(Redirect::to(&format!("{LOGIN_URL}?next=/")).into_response());
    };

    let body = format!(
        r#"<h1>Welcome, {}</h1>
<p>Manage your <a href="/profiles/">profile</a>, <a href="/user-skills/">skills</a> and <a href="/swap-requests/">swap requests</a>.</p>
<form method="post" action="/logout/"><button type="submit">Log out</button></form>"#,
        encode_text(&user.username)
    );
    Ok(page("Dashboard", &body).into_response())
}

async fn signup_page() -> Html<String> {
    render_signup(&SignupForm::default(), &FieldErrors::new())
}

async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> Result<Response> {
    let mut errors = FieldErrors::new();
    if form.username.is_empty() {
        errors.insert("username".to_string(), vec![REQUIRED.to_string()]);
    }
    if form.password1.is_empty() {
        errors.insert("password1".to_string(), vec![REQUIRED.to_string()]);
    }
    if form.password2.is_empty() {
        errors.insert("password2".to_string(), vec![REQUIRED.to_string()]);
    } else if !form.password1.is_empty() && form.password1 != form.password2 {
        errors.insert(
            "password2".to_string(),
            vec!["The two password fields didn't match.".to_string()],
        );
    } else if !form.password1.is_empty() {
        let problems = password_problems(&form.username, &form.password2);
        if !problems.is_empty() {
            errors.insert("password2".to_string(), problems);
        }
    }
    if !errors.is_empty() {
        return Ok(render_signup(&form, &errors).into_response());
    }

    let identity = state.identity();
    let user = match identity
        .create_account(&form.username, &form.password1, "")
        .await
    {
        Ok(user) => user,
        Err(AppError::Conflict(message)) => {
            errors.insert("username".to_string(), vec![message]);
            return Ok(render_signup(&form, &errors).into_response());
        }
        Err(AppError::InvalidFields(fields)) => {
            for (field, messages) in fields {
                let field = if field == "password" { "password2".to_string() } else { field };
                errors.entry(field).or_default().extend(messages);
            }
            return Ok(render_signup(&form, &errors).into_response());
        }
        Err(e) => return Err(e),
    };

    let session = identity.open_session(user).await?;
    let jar = jar.add(session_cookie(session.token));
    Ok((jar, Redirect::to("/")).into_response())
}

async fn login_page(Query(query): Query<NextQuery>) -> Html<String> {
    render_login("", query.next.as_deref(), None)
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    if form.username.is_empty() || form.password.is_empty() {
        return Ok(render_login(&form.username, form.next.as_deref(), Some(INVALID_LOGIN)).into_response());
    }

    match state.identity().login(&form.username, &form.password).await {
        Ok(session) => {
            tracing::info!(user_id = session.user.id, "logged in");
            let jar = jar.add(session_cookie(session.token));
            let target = safe_next(form.next.as_deref());
            Ok((jar, Redirect::to(target)).into_response())
        }
        Err(AppError::InvalidCredentials) => {
            Ok(render_login(&form.username, form.next.as_deref(), Some(INVALID_LOGIN)).into_response())
        }
        Err(e) => Err(e),
    }
}

async fn logout(State(state): State<AppState>, jar: CookieJar) -> Result<Response> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.identity().invalidate(cookie.value()).await?;
    }
    let jar = jar.remove(expired_session_cookie());
    Ok((jar, Redirect::to(LOGIN_URL)).into_response())
}

/// Only same-site absolute paths are followed after login.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => "/",
    }
}

fn render_signup(form: &SignupForm, errors: &FieldErrors) -> Html<String> {
    let body = format!(
        r#"<h1>Sign up</h1>
<form method="post" action="/signup/">
<label>Username <input type="text" name="username" value="{}" maxlength="150" required></label>
{}
<label>Password <input type="password" name="password1" required></label>
{}
<label>Password confirmation <input type="password" name="password2" required></label>
{}
<button type="submit">Sign up</button>
</form>
<p>Already have an account? <a href="{LOGIN_URL}">Log in</a></p>"#,
        encode_double_quoted_attribute(&form.username),
        error_list(errors.get("username")),
        error_list(errors.get("password1")),
        error_list(errors.get("password2")),
    );
    page("Sign up", &body)
}

fn render_login(username: &str, next: Option<&str>, error: Option<&str>) -> Html<String> {
    let error = error
        .map(|e| format!(r#"<p class="errornote">{}</p>"#, encode_text(e)))
        .unwrap_or_default();
    let next = next
        .map(|n| format!(
                r#"<input type="hidden" name="next" value="{}">"#,
                encode_double_quoted_attribute(n)
            ))
        .unwrap_or_default();
    let body = format!(
        r#"<h1>Log in</h1>
{error}
<form method="post" action="{LOGIN_URL}">
<label>Username <input type="text" name="username" value="{}" required></label>
<label>Password <input type="password" name="password" required></label>
{next}
<button type="submit">Log in</button>
</form>
<p>No account yet? <a href="/signup/">Sign up</a></p>"#,
        encode_double_quoted_attribute(username),
    );
    page("Log in", &body)
}

fn error_list(messages: Option<&Vec<String>>) -> String {
    match messages {
        Some(messages) if !messages.is_empty() => {
            let items: String = messages
                .iter()
                .map(|m| format!("<li>{}</li>", encode_text(m)))
                .collect();
            format!(r#"<ul class="errorlist">{items}</ul>"#)
        }
        _ => String::new(),
    }
}

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{} | Skill Swap</title></head>\n<body>\n{body}\n</body>\n</html>\n",
        encode_text(title)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_must_stay_on_site() {
        assert_eq!(safe_next(Some("/profiles/")), "/profiles/");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(Some("/\\evil.example")), "/");
        assert_eq!(safe_next(None), "/");
    }

    #[test]
    fn user_input_is_escaped_in_text_and_attributes() {
        let form = SignupForm {
            username: r#""><script>alert(1)</script>"#.to_string(),
            ..SignupForm::default()
        };
        let Html(html) = render_signup(&form, &FieldErrors::new());
        assert!(!html.contains(r#""><script>"#));
        assert!(html.contains("&quot;"));

        let Html(html) = render_login("x", Some(r#"/"onfocus="x"#), Some("<b>bad</b>"));
        assert!(!html.contains(r#""onfocus=""#));
        assert!(html.contains("&lt;b&gt;bad&lt;/b&gt;"));
    }

    #[test]
    fn signup_form_shows_field_errors() {
        let mut errors = FieldErrors::new();
        errors.insert(
            "password2".to_string(),
            vec!["The two password fields didn't match.".to_string()],
        );
        let form = SignupForm {
            username: "alice".to_string(),
            ..SignupForm::default()
        };
        let Html(html) = render_signup(&form, &errors);
        assert!(html.contains(r#"value="alice""#));
        assert!(html.contains("didn't match"));
    }
}
