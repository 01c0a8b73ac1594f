use axum::async_trait;
use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    db::models::{SwapRequest, SwapStatus},
    error::{AppError, Result},
    middleware::auth::AuthUser,
    routes::resource::{ensure_exists, Referenced, Resource},
    AppState,
};

const SELECT_SWAP: &str = r#"
    SELECT id, requester_id AS requester, receiver_id AS receiver,
           offered_skill_id AS offered_skill, requested_skill_id AS requested_skill,
           status, created_at
    FROM swap_requests
"#;

/// Swap requests are private to their two participants under the owner
/// policy. The requester owns the terms and may cancel or delete; the
/// receiver answers by accepting or rejecting.
pub struct SwapRequests;

#[derive(Debug, Deserialize, Validate)]
pub struct SwapRequestInput {
    /// Defaults to the caller.
    pub requester: Option<i64>,
    pub receiver: i64,
    pub offered_skill: i64,
    pub requested_skill: i64,
    pub status: Option<SwapStatus>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SwapRequestPatch {
    pub requester: Option<i64>,
    pub receiver: Option<i64>,
    pub offered_skill: Option<i64>,
    pub requested_skill: Option<i64>,
    pub status: Option<SwapStatus>,
}

impl From<SwapRequestInput> for SwapRequestPatch {
    fn from(input: SwapRequestInput) -> Self {
        Self {
            requester: input.requester,
            receiver: Some(input.receiver),
            offered_skill: Some(input.offered_skill),
            requested_skill: Some(input.requested_skill),
            status: input.status,
        }
    }
}

pub async fn find(pool: &SqlitePool, id: i64) -> Result<Option<SwapRequest>> {
    let swap = sqlx::query_as::<_, SwapRequest>(&format!("{SELECT_SWAP} WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(swap)
}

fn not_found() -> AppError {
    AppError::NotFound("Swap request not found".to_string())
}

#[async_trait]
impl Resource for SwapRequests {
    const PATH: &'static str = "swap-requests";

    type Record = SwapRequest;
    type Input = SwapRequestInput;
    type Patch = SwapRequestPatch;

    async fn list(state: &AppState, caller: &AuthUser) -> Result<Vec<SwapRequest>> {
        let swaps = if state.access().scoped() {
            sqlx::query_as::<_, SwapRequest>(&format!(
                "{SELECT_SWAP} WHERE requester_id = ? OR receiver_id = ? ORDER BY id"
            ))
            .bind(caller.id)
            .bind(caller.id)
            .fetch_all(&state.db.pool)
            .await?
        } else {
            sqlx::query_as::<_, SwapRequest>(&format!("{SELECT_SWAP} ORDER BY id"))
                .fetch_all(&state.db.pool)
                .await?
        };
        Ok(swaps)
    }

    async fn get(state: &AppState, caller: &AuthUser, id: i64) -> Result<SwapRequest> {
        let swap = find(&state.db.pool, id).await?.ok_or_else(not_found)?;
        if state.access().scoped() && !swap.involves(caller.id) {
            return Err(not_found());
        }
        Ok(swap)
    }

    async fn create(
        state: &AppState,
        caller: &AuthUser,
        input: SwapRequestInput,
    ) -> Result<SwapRequest> {
        let access = state.access();
        let requester = input.requester.unwrap_or(caller.id);
        access.require_owner(caller, requester, "You can only send swap requests as yourself.")?;

        let pool = &state.db.pool;
        ensure_exists(pool, Referenced::Users, requester, "requester").await?;
        ensure_exists(pool, Referenced::Users, input.receiver, "receiver").await?;
        ensure_exists(pool, Referenced::Skills, input.offered_skill, "offered_skill").await?;
        ensure_exists(pool, Referenced::Skills, input.requested_skill, "requested_skill").await?;

        let status = input.status.unwrap_or_default();
        access.check_initial_status(status)?;

        let created_at = Utc::now();
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO swap_requests (requester_id, receiver_id, offered_skill_id, requested_skill_id, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(requester)
        .bind(input.receiver)
        .bind(input.offered_skill)
        .bind(input.requested_skill)
        .bind(status)
        .bind(created_at)
        .fetch_one(pool)
        .await?;

        tracing::info!(
            swap_request_id = id,
            requester,
            receiver = input.receiver,
            "swap requested"
        );

        find(pool, id).await?.ok_or_else(not_found)
    }

    async fn update(
        state: &AppState,
        caller: &AuthUser,
        id: i64,
        patch: SwapRequestPatch,
    ) -> Result<SwapRequest> {
        let access = state.access();
        let pool = &state.db.pool;
        let mut swap = Self::get(state, caller, id).await?;
        access.require_any_of(
            caller,
            &[swap.requester, swap.receiver],
            "Only the participants can change this swap request.",
        )?;

        if let Some(requester) = patch.requester.filter(|r| *r != swap.requester) {
            if access.scoped() {
                return Err(AppError::Forbidden(
                    "The requester of a swap request cannot be changed.".to_string(),
                ));
            }
            ensure_exists(pool, Referenced::Users, requester, "requester").await?;
            swap.requester = requester;
        }
        let receiver = patch.receiver.filter(|r| *r != swap.receiver);
        let offered_skill = patch.offered_skill.filter(|s| *s != swap.offered_skill);
        let requested_skill = patch.requested_skill.filter(|s| *s != swap.requested_skill);
        if receiver.is_some() || offered_skill.is_some() || requested_skill.is_some() {
            access.require_owner(
                caller,
                swap.requester,
                "Only the requester can change the terms of this swap request.",
            )?;
        }
        if let Some(status) = patch.status {
            access.check_transition(swap.status, status)?;
            access.require_status_role(caller, &swap, status)?;
        }

        if let Some(receiver) = receiver {
            ensure_exists(pool, Referenced::Users, receiver, "receiver").await?;
            swap.receiver = receiver;
        }
        if let Some(skill) = offered_skill {
            ensure_exists(pool, Referenced::Skills, skill, "offered_skill").await?;
            swap.offered_skill = skill;
        }
        if let Some(skill) = requested_skill {
            ensure_exists(pool, Referenced::Skills, skill, "requested_skill").await?;
            swap.requested_skill = skill;
        }
        if let Some(status) = patch.status {
            if status != swap.status {
                tracing::info!(swap_request_id = id, from = %swap.status, to = %status, "swap status changed");
            }
            swap.status = status;
        }

        sqlx::query(
            r#"
            UPDATE swap_requests
            SET requester_id = ?, receiver_id = ?, offered_skill_id = ?, requested_skill_id = ?, status = ?
            WHERE id = ?
            "#,
        )
        .bind(swap.requester)
        .bind(swap.receiver)
        .bind(swap.offered_skill)
        .bind(swap.requested_skill)
        .bind(swap.status)
        .bind(id)
        .execute(pool)
        .await?;

        Ok(swap)
    }

    async fn delete(state: &AppState, caller: &AuthUser, id: i64) -> Result<()> {
        let swap = Self::get(state, caller, id).await?;
        state.access().require_owner(
            caller,
            swap.requester,
            "Only the requester can delete this swap request.",
        )?;

        // Feedback for the swap goes with it.
        sqlx::query("DELETE FROM swap_requests WHERE id = ?")
            .bind(id)
            .execute(&state.db.pool)
            .await?;

        tracing::info!(swap_request_id = id, "swap request deleted");
        Ok(())
    }
}
