use axum::async_trait;
use serde::Deserialize;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    db::models::{Feedback, SwapRequest},
    error::{AppError, Result},
    middleware::auth::AuthUser,
    routes::{
        resource::{invalid_pk, Resource},
        swap_requests,
    },
    AppState,
};

const SELECT_FEEDBACK: &str = r#"
    SELECT f.id, f.swap_request_id AS swap_request, f.rating, f.comment
    FROM feedbacks f
"#;

const DUPLICATE_FEEDBACK: &str = "feedback with this swap request already exists.";

pub struct Feedbacks;

#[derive(Debug, Deserialize, Validate)]
pub struct FeedbackInput {
    pub swap_request: i64,
    #[validate(range(min = 0, max = 32767, message = "Ensure this value is between 0 and 32767."))]
    pub rating: i32,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct FeedbackPatch {
    pub swap_request: Option<i64>,
    #[validate(range(min = 0, max = 32767, message = "Ensure this value is between 0 and 32767."))]
    pub rating: Option<i32>,
    pub comment: Option<String>,
}

impl From<FeedbackInput> for FeedbackPatch {
    fn from(input: FeedbackInput) -> Self {
        Self {
            swap_request: Some(input.swap_request),
            rating: Some(input.rating),
            comment: Some(input.comment),
        }
    }
}

async fn find(pool: &SqlitePool, id: i64) -> Result<Option<Feedback>> {
    let feedback = sqlx::query_as::<_, Feedback>(&format!("{SELECT_FEEDBACK} WHERE f.id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(feedback)
}

fn not_found() -> AppError {
    AppError::NotFound("Feedback not found".to_string())
}

/// Resolves the swap a feedback points at, treating swaps the caller may not
/// see exactly like missing ones.
async fn target_swap(state: &AppState, caller: &AuthUser, id: i64) -> Result<SwapRequest> {
    match swap_requests::find(&state.db.pool, id).await? {
        Some(swap) if !state.access().scoped() || swap.involves(caller.id) => Ok(swap),
        _ => Err(invalid_pk("swap_request", id)),
    }
}

#[async_trait]
impl Resource for Feedbacks {
    const PATH: &'static str = "feedbacks";

    type Record = Feedback;
    type Input = FeedbackInput;
    type Patch = FeedbackPatch;

    async fn list(state: &AppState, caller: &AuthUser) -> Result<Vec<Feedback>> {
        let feedbacks = if state.access().scoped() {
            sqlx::query_as::<_, Feedback>(&format!(
                r#"{SELECT_FEEDBACK}
                JOIN swap_requests s ON f.swap_request_id = s.id
                WHERE s.requester_id = ? OR s.receiver_id = ?
                ORDER BY f.id"#
            ))
            .bind(caller.id)
            .bind(caller.id)
            .fetch_all(&state.db.pool)
            .await?
        } else {
            sqlx::query_as::<_, Feedback>(&format!("{SELECT_FEEDBACK} ORDER BY f.id"))
                .fetch_all(&state.db.pool)
                .await?
        };
        Ok(feedbacks)
    }

    async fn get(state: &AppState, caller: &AuthUser, id: i64) -> Result<Feedback> {
        let feedback = find(&state.db.pool, id).await?.ok_or_else(not_found)?;
        if state.access().scoped() {
            let visible = swap_requests::find(&state.db.pool, feedback.swap_request)
                .await?
                .is_some_and(|swap| swap.involves(caller.id));
            if !visible {
                return Err(not_found());
            }
        }
        Ok(feedback)
    }

    async fn create(state: &AppState, caller: &AuthUser, input: FeedbackInput) -> Result<Feedback> {
        let swap = target_swap(state, caller, input.swap_request).await?;

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO feedbacks (swap_request_id, rating, comment) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(swap.id)
        .bind(input.rating)
        .bind(&input.comment)
        .fetch_one(&state.db.pool)
        .await
        .map_err(AppError::unique(DUPLICATE_FEEDBACK))?;

        tracing::info!(feedback_id = id, swap_request_id = swap.id, rating = input.rating, "feedback left");

        Ok(Feedback {
            id,
            swap_request: swap.id,
            rating: input.rating,
            comment: input.comment,
        })
    }

    async fn update(
        state: &AppState,
        caller: &AuthUser,
        id: i64,
        patch: FeedbackPatch,
    ) -> Result<Feedback> {
        let mut feedback = Self::get(state, caller, id).await?;

        if let Some(swap_request) = patch.swap_request {
            feedback.swap_request = target_swap(state, caller, swap_request).await?.id;
        }
        if let Some(rating) = patch.rating {
            feedback.rating = rating;
        }
        if let Some(comment) = patch.comment {
            feedback.comment = comment;
        }

        sqlx::query("UPDATE feedbacks SET swap_request_id = ?, rating = ?, comment = ? WHERE id = ?")
            .bind(feedback.swap_request)
            .bind(feedback.rating)
            .bind(&feedback.comment)
            .bind(id)
            .execute(&state.db.pool)
            .await
            .map_err(AppError::unique(DUPLICATE_FEEDBACK))?;

        Ok(feedback)
    }

    async fn delete(state: &AppState, caller: &AuthUser, id: i64) -> Result<()> {
        Self::get(state, caller, id).await?;

        sqlx::query("DELETE FROM feedbacks WHERE id = ?")
            .bind(id)
            .execute(&state.db.pool)
            .await?;

        Ok(())
    }
}
