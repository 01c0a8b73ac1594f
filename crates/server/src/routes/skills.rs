use axum::async_trait;
use serde::Deserialize;
use validator::Validate;

use crate::{
    db::models::Skill,
    error::{AppError, Result},
    middleware::auth::AuthUser,
    routes::resource::Resource,
    AppState,
};

const DUPLICATE_NAME: &str = "skill with this name already exists.";

/// The shared skill catalog. Skills have no owner, so every authenticated
/// user may curate them regardless of the access policy.
pub struct Skills;

#[derive(Debug, Deserialize, Validate)]
pub struct SkillInput {
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SkillPatch {
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    pub name: Option<String>,
}

impl From<SkillInput> for SkillPatch {
    fn from(input: SkillInput) -> Self {
        Self {
            name: Some(input.name),
        }
    }
}

fn clean_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::field("name", "This field may not be blank."));
    }
    Ok(name)
}

#[async_trait]
impl Resource for Skills {
    const PATH: &'static str = "skills";

    type Record = Skill;
    type Input = SkillInput;
    type Patch = SkillPatch;

    async fn list(state: &AppState, _caller: &AuthUser) -> Result<Vec<Skill>> {
        let skills = sqlx::query_as::<_, Skill>("SELECT id, name FROM skills ORDER BY id")
            .fetch_all(&state.db.pool)
            .await?;
        Ok(skills)
    }

    async fn get(state: &AppState, _caller: &AuthUser, id: i64) -> Result<Skill> {
        sqlx::query_as::<_, Skill>("SELECT id, name FROM skills WHERE id = ?")
            .bind(id)
            .fetch_optional(&state.db.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Skill not found".to_string()))
    }

    async fn create(state: &AppState, _caller: &AuthUser, input: SkillInput) -> Result<Skill> {
        let name = clean_name(&input.name)?;

        let id = sqlx::query_scalar::<_, i64>("INSERT INTO skills (name) VALUES (?) RETURNING id")
            .bind(name)
            .fetch_one(&state.db.pool)
            .await
            .map_err(AppError::unique(DUPLICATE_NAME))?;

        tracing::info!(skill_id = id, name, "skill created");

        Ok(Skill {
            id,
            name: name.to_string(),
        })
    }

    async fn update(
        state: &AppState,
        caller: &AuthUser,
        id: i64,
        patch: SkillPatch,
    ) -> Result<Skill> {
        let mut skill = Self::get(state, caller, id).await?;

        if let Some(name) = patch.name {
            skill.name = clean_name(&name)?.to_string();
        }

        sqlx::query("UPDATE skills SET name = ? WHERE id = ?")
            .bind(&skill.name)
            .bind(id)
            .execute(&state.db.pool)
            .await
            .map_err(AppError::unique(DUPLICATE_NAME))?;

        Ok(skill)
    }

    async fn delete(state: &AppState, _caller: &AuthUser, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM skills WHERE id = ?")
            .bind(id)
            .execute(&state.db.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Skill not found".to_string()));
        }

        tracing::info!(skill_id = id, "skill deleted");
        Ok(())
    }
}
