//! Accounts and sessions.
//!
//! A session is an opaque random token mapped to a user id with an explicit
//! expiry. Expired sessions are removed the first time they are looked up.

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    config::MAX_SESSION_TTL_HOURS,
    db::models::{User, UserSummary},
    error::{AppError, FieldErrors, Result},
    middleware::auth::AuthUser,
    services::password::{
        hash_password, password_problems, username_problems, verify_password, verify_unknown_user,
    },
};

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: UserSummary,
    pub expires_at: DateTime<Utc>,
}

pub struct Identity<'a> {
    pool: &'a SqlitePool,
    session_ttl: Duration,
}

impl<'a> Identity<'a> {
    pub fn new(pool: &'a SqlitePool, session_ttl_hours: i64) -> Self {
        let hours = session_ttl_hours.clamp(0, MAX_SESSION_TTL_HOURS);
        Self {
            pool,
            session_ttl: Duration::hours(hours),
        }
    }

    pub async fn create_account(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<UserSummary> {
        let mut fields = FieldErrors::new();
        let username_errors = username_problems(username);
        if !username_errors.is_empty() {
            fields.insert("username".to_string(), username_errors);
        }
        let password_errors = password_problems(username, password);
        if !password_errors.is_empty() {
            fields.insert("password".to_string(), password_errors);
        }
        if !fields.is_empty() {
            return Err(AppError::InvalidFields(fields));
        }

        let password_hash = hash_password(password)?;
        let now = Utc::now();

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (username, email, password_hash, date_joined) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(username)
        .bind(email)
        .bind(&password_hash)
        .bind(now)
        .fetch_one(self.pool)
        .await
        .map_err(AppError::unique("A user with that username already exists."))?;

        tracing::info!(user_id = id, username, "account created");

        Ok(UserSummary {
            id,
            username: username.to_string(),
            email: email.to_string(),
        })
    }

    /// Checks credentials without revealing which half was wrong.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<UserSummary> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, date_joined FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        let Some(user) = user else {
            verify_unknown_user(password);
            return Err(AppError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash)? {
            tracing::debug!(username, "password mismatch");
            return Err(AppError::InvalidCredentials);
        }

        Ok(user.into())
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        let user = self.authenticate(username, password).await?;
        self.open_session(user).await
    }

    pub async fn open_session(&self, user: UserSummary) -> Result<Session> {
        let token = Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.session_ttl)
            .ok_or_else(|| AppError::Internal("Session lifetime out of range".to_string()))?;

        sqlx::query(
            "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&token)
        .bind(user.id)
        .bind(now)
        .bind(expires_at)
        .execute(self.pool)
        .await?;

        tracing::debug!(user_id = user.id, "session opened");

        Ok(Session {
            token,
            user,
            expires_at,
        })
    }

    pub async fn current_user(&self, token: &str) -> Result<Option<AuthUser>> {
        let row = sqlx::query_as::<_, (i64, String, String, DateTime<Utc>)>(
            r#"
            SELECT u.id, u.username, u.email, s.expires_at
            FROM sessions s
            JOIN users u ON s.user_id = u.id
            WHERE s.token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;

        let Some((id, username, email, expires_at)) = row else {
            return Ok(None);
        };

        if expires_at <= Utc::now() {
            self.invalidate(token).await?;
            return Ok(None);
        }

        Ok(Some(AuthUser {
            id,
            username,
            email,
            token: token.to_string(),
        }))
    }

    pub async fn invalidate(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Removes the account; profiles, listed skills, swap requests and
    /// sessions go with it through the schema's cascades.
    pub async fn delete_account(&self, user_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        tracing::info!(user_id, "account deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn database() -> Database {
        let db = Database::in_memory().await.unwrap();
        db.run_migrations().await.unwrap();
        db
    }

    #[tokio::test]
    async fn sessions_resolve_until_invalidated() {
        let db = database().await;
        let identity = Identity::new(&db.pool, 1);
        identity
            .create_account("alice", "violet-harbor-42", "")
            .await
            .unwrap();

        let session = identity.login("alice", "violet-harbor-42").await.unwrap();
        let user = identity.current_user(&session.token).await.unwrap().unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.token, session.token);

        identity.invalidate(&session.token).await.unwrap();
        assert!(identity.current_user(&session.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_sessions_are_dropped_on_lookup() {
        let db = database().await;
        let identity = Identity::new(&db.pool, 0);
        let user = identity
            .create_account("alice", "violet-harbor-42", "")
            .await
            .unwrap();

        let session = identity.open_session(user).await.unwrap();
        assert!(identity.current_user(&session.token).await.unwrap().is_none());

        let remaining = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sessions")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_the_same() {
        let db = database().await;
        let identity = Identity::new(&db.pool, 1);
        identity
            .create_account("alice", "violet-harbor-42", "")
            .await
            .unwrap();

        assert!(matches!(
            identity.authenticate("alice", "nope-nope-nope").await,
            Err(AppError::InvalidCredentials)
        ));
        assert!(matches!(
            identity.authenticate("zed", "nope-nope-nope").await,
            Err(AppError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn unknown_usernames_take_as_long_as_wrong_passwords() {
        let db = database().await;
        let identity = Identity::new(&db.pool, 1);
        identity
            .create_account("alice", "violet-harbor-42", "")
            .await
            .unwrap();
        // Warm up the throwaway hash.
        let _ = identity.authenticate("zed", "nope-nope-nope").await;

        async fn fastest(identity: &Identity<'_>, username: &str) -> std::time::Duration {
            let mut best = std::time::Duration::MAX;
            for _ in 0..3 {
                let started = std::time::Instant::now();
                let _ = identity.authenticate(username, "nope-nope-nope").await;
                best = best.min(started.elapsed());
            }
            best
        }

        let known = fastest(&identity, "alice").await;
        let unknown = fastest(&identity, "zed").await;
        assert!(
            unknown * 4 >= known,
            "unknown user answered in {unknown:?}, wrong password in {known:?}"
        );
    }

    #[tokio::test]
    async fn oversized_session_lifetimes_are_capped() {
        let db = database().await;
        let identity = Identity::new(&db.pool, 2_400_000_000);
        let user = identity
            .create_account("alice", "violet-harbor-42", "")
            .await
            .unwrap();

        let session = identity.open_session(user).await.unwrap();
        let ceiling = Utc::now() + Duration::hours(MAX_SESSION_TTL_HOURS);
        assert!(session.expires_at <= ceiling);
        assert!(identity.current_user(&session.token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn deleting_unknown_account_is_not_found() {
        let db = database().await;
        let identity = Identity::new(&db.pool, 1);
        assert!(matches!(
            identity.delete_account(42).await,
            Err(AppError::NotFound(_))
        ));
    }
}
