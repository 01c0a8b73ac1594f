use axum::async_trait;
use serde::Deserialize;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    db::models::{SkillType, UserSkill, UserSkillRow},
    error::{AppError, Result},
    middleware::auth::AuthUser,
    routes::resource::{ensure_exists, Referenced, Resource},
    AppState,
};

const SELECT_USER_SKILL: &str = r#"
    SELECT us.id, us.user_id, u.username, u.email, us.skill_id AS skill, us.skill_type
    FROM user_skills us
    JOIN users u ON us.user_id = u.id
"#;

const DUPLICATE_LISTING: &str = "The fields user, skill, skill_type must make a unique set.";

/// Skills a user offers or wants. Listings are public so that people can
/// find each other; only the owner may change or remove one.
pub struct UserSkills;

#[derive(Debug, Deserialize, Validate)]
pub struct UserSkillInput {
    pub skill: i64,
    pub skill_type: SkillType,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UserSkillPatch {
    pub skill: Option<i64>,
    pub skill_type: Option<SkillType>,
}

impl From<UserSkillInput> for UserSkillPatch {
    fn from(input: UserSkillInput) -> Self {
        Self {
            skill: Some(input.skill),
            skill_type: Some(input.skill_type),
        }
    }
}

async fn find(pool: &SqlitePool, id: i64) -> Result<Option<UserSkill>> {
    let row = sqlx::query_as::<_, UserSkillRow>(&format!("{SELECT_USER_SKILL} WHERE us.id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(UserSkill::from))
}

#[async_trait]
impl Resource for UserSkills {
    const PATH: &'static str = "user-skills";

    type Record = UserSkill;
    type Input = UserSkillInput;
    type Patch = UserSkillPatch;

    async fn list(state: &AppState, _caller: &AuthUser) -> Result<Vec<UserSkill>> {
        let rows = sqlx::query_as::<_, UserSkillRow>(&format!("{SELECT_USER_SKILL} ORDER BY us.id"))
            .fetch_all(&state.db.pool)
            .await?;
        Ok(rows.into_iter().map(UserSkill::from).collect())
    }

    async fn get(state: &AppState, _caller: &AuthUser, id: i64) -> Result<UserSkill> {
        find(&state.db.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound("User skill not found".to_string()))
    }

    async fn create(state: &AppState, caller: &AuthUser, input: UserSkillInput) -> Result<UserSkill> {
        ensure_exists(&state.db.pool, Referenced::Skills, input.skill, "skill").await?;

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO user_skills (user_id, skill_id, skill_type) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(caller.id)
        .bind(input.skill)
        .bind(input.skill_type)
        .fetch_one(&state.db.pool)
        .await
        .map_err(AppError::unique(DUPLICATE_LISTING))?;

        tracing::info!(user_skill_id = id, user_id = caller.id, skill_id = input.skill, "skill listed");

        Self::get(state, caller, id).await
    }

    async fn update(
        state: &AppState,
        caller: &AuthUser,
        id: i64,
        patch: UserSkillPatch,
    ) -> Result<UserSkill> {
        let mut listing = Self::get(state, caller, id).await?;
        state
            .access()
            .require_owner(caller, listing.user.id, "You can only edit your own skills.")?;

        if let Some(skill) = patch.skill {
            ensure_exists(&state.db.pool, Referenced::Skills, skill, "skill").await?;
            listing.skill = skill;
        }
        if let Some(skill_type) = patch.skill_type {
            listing.skill_type = skill_type;
        }

        sqlx::query("UPDATE user_skills SET skill_id = ?, skill_type = ? WHERE id = ?")
            .bind(listing.skill)
            .bind(listing.skill_type)
            .bind(id)
            .execute(&state.db.pool)
            .await
            .map_err(AppError::unique(DUPLICATE_LISTING))?;

        Ok(listing)
    }

    async fn delete(state: &AppState, caller: &AuthUser, id: i64) -> Result<()> {
        let listing = Self::get(state, caller, id).await?;
        state
            .access()
            .require_owner(caller, listing.user.id, "You can only remove your own skills.")?;

        sqlx::query("DELETE FROM user_skills WHERE id = ?")
            .bind(id)
            .execute(&state.db.pool)
            .await?;

        Ok(())
    }
}
