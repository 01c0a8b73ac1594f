use axum::async_trait;
use serde::Deserialize;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    db::models::{Profile, ProfileRow},
    error::{AppError, Result},
    middleware::auth::AuthUser,
    routes::resource::{nullable, Resource},
    AppState,
};

const SELECT_PROFILE: &str = r#"
    SELECT p.id, p.user_id, u.username, u.email, p.location, p.profile_photo, p.availability, p.is_public
    FROM profiles p
    JOIN users u ON p.user_id = u.id
"#;

pub struct Profiles;

#[derive(Debug, Deserialize, Validate)]
pub struct ProfileInput {
    #[serde(default)]
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    pub location: String,
    #[serde(default)]
    pub profile_photo: Option<String>,
    #[serde(default)]
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    pub availability: String,
    #[serde(default = "default_public")]
    pub is_public: bool,
}

fn default_public() -> bool {
    true
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProfilePatch {
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub profile_photo: Option<Option<String>>,
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    pub availability: Option<String>,
    pub is_public: Option<bool>,
}

impl From<ProfileInput> for ProfilePatch {
    fn from(input: ProfileInput) -> Self {
        Self {
            location: Some(input.location),
            profile_photo: Some(input.profile_photo),
            availability: Some(input.availability),
            is_public: Some(input.is_public),
        }
    }
}

async fn find(pool: &SqlitePool, id: i64) -> Result<Option<Profile>> {
    let row = sqlx::query_as::<_, ProfileRow>(&format!("{SELECT_PROFILE} WHERE p.id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Profile::from))
}

fn not_found() -> AppError {
    AppError::NotFound("Profile not found".to_string())
}

#[async_trait]
impl Resource for Profiles {
    const PATH: &'static str = "profiles";

    type Record = Profile;
    type Input = ProfileInput;
    type Patch = ProfilePatch;

    async fn list(state: &AppState, caller: &AuthUser) -> Result<Vec<Profile>> {
        let rows = if state.access().scoped() {
            sqlx::query_as::<_, ProfileRow>(&format!(
                "{SELECT_PROFILE} WHERE p.is_public = 1 OR p.user_id = ? ORDER BY p.id"
            ))
            .bind(caller.id)
            .fetch_all(&state.db.pool)
            .await?
        } else {
            sqlx::query_as::<_, ProfileRow>(&format!("{SELECT_PROFILE} ORDER BY p.id"))
                .fetch_all(&state.db.pool)
                .await?
        };

        Ok(rows.into_iter().map(Profile::from).collect())
    }

    async fn get(state: &AppState, caller: &AuthUser, id: i64) -> Result<Profile> {
        let profile = find(&state.db.pool, id).await?.ok_or_else(not_found)?;

        // Private profiles are invisible to everyone but their owner.
        if state.access().scoped() && !profile.is_public && profile.user.id != caller.id {
            return Err(not_found());
        }
        Ok(profile)
    }

    async fn create(state: &AppState, caller: &AuthUser, input: ProfileInput) -> Result<Profile> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO profiles (user_id, location, profile_photo, availability, is_public) VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(caller.id)
        .bind(&input.location)
        .bind(&input.profile_photo)
        .bind(&input.availability)
        .bind(input.is_public)
        .fetch_one(&state.db.pool)
        .await
        .map_err(AppError::unique("profile with this user already exists."))?;

        tracing::info!(profile_id = id, user_id = caller.id, "profile created");

        find(&state.db.pool, id).await?.ok_or_else(not_found)
    }

    async fn update(
        state: &AppState,
        caller: &AuthUser,
        id: i64,
        patch: ProfilePatch,
    ) -> Result<Profile> {
        let mut profile = Self::get(state, caller, id).await?;
        state
            .access()
            .require_owner(caller, profile.user.id, "You can only edit your own profile.")?;

        if let Some(location) = patch.location {
            profile.location = location;
        }
        if let Some(photo) = patch.profile_photo {
            profile.profile_photo = photo;
        }
        if let Some(availability) = patch.availability {
            profile.availability = availability;
        }
        if let Some(is_public) = patch.is_public {
            profile.is_public = is_public;
        }

        sqlx::query(
            "UPDATE profiles SET location = ?, profile_photo = ?, availability = ?, is_public = ? WHERE id = ?",
        )
        .bind(&profile.location)
        .bind(&profile.profile_photo)
        .bind(&profile.availability)
        .bind(profile.is_public)
        .bind(id)
        .execute(&state.db.pool)
        .await?;

        Ok(profile)
    }

    async fn delete(state: &AppState, caller: &AuthUser, id: i64) -> Result<()> {
        let profile = Self::get(state, caller, id).await?;
        state
            .access()
            .require_owner(caller, profile.user.id, "You can only delete your own profile.")?;

        sqlx::query("DELETE FROM profiles WHERE id = ?")
            .bind(id)
            .execute(&state.db.pool)
            .await?;

        tracing::info!(profile_id = id, "profile deleted");
        Ok(())
    }
}
