//! Uniform CRUD surface shared by every entity resource.
//!
//! Each entity implements [`Resource`] once; [`router`] mounts the five
//! operations under `/{PATH}/` and `/{PATH}/:id/`.

use axum::{
    async_trait,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::{AppError, Result},
    extractors::ValidatedJson,
    middleware::auth::AuthUser,
    AppState,
};

#[async_trait]
pub trait Resource: Send + Sync + 'static {
    /// Collection path segment, e.g. `"swap-requests"`.
    const PATH: &'static str;

    /// Wire representation returned by every operation.
    type Record: Serialize + Send;
    /// Full set of writable fields, used by create and PUT.
    type Input: DeserializeOwned + Validate + Send + 'static;
    /// Any subset of writable fields, used by PATCH.
    type Patch: DeserializeOwned + Validate + From<Self::Input> + Send + 'static;

    async fn list(state: &AppState, caller: &AuthUser) -> Result<Vec<Self::Record>>;

    async fn get(state: &AppState, caller: &AuthUser, id: i64) -> Result<Self::Record>;

    async fn create(state: &AppState, caller: &AuthUser, input: Self::Input)
        -> Result<Self::Record>;

    async fn update(
        state: &AppState,
        caller: &AuthUser,
        id: i64,
        patch: Self::Patch,
    ) -> Result<Self::Record>;

    async fn delete(state: &AppState, caller: &AuthUser, id: i64) -> Result<()>;
}

pub fn router<R: Resource>() -> Router<AppState> {
    let collection = format!("/{}/", R::PATH);
    let member = format!("/{}/:id/", R::PATH);

    Router::new()
        .route(&collection, get(list::<R>).post(create::<R>))
        .route(
            &member,
            get(retrieve::<R>)
                .put(replace::<R>)
                .patch(modify::<R>)
                .delete(destroy::<R>),
        )
}

async fn list<R: Resource>(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Vec<R::Record>>> {
    Ok(Json(R::list(&state, &caller).await?))
}

async fn create<R: Resource>(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidatedJson(input): ValidatedJson<R::Input>,
) -> Result<(StatusCode, Json<R::Record>)> {
    let record = R::create(&state, &caller, input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn retrieve<R: Resource>(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<R::Record>> {
    Ok(Json(R::get(&state, &caller, id).await?))
}

async fn replace<R: Resource>(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
    ValidatedJson(input): ValidatedJson<R::Input>,
) -> Result<Json<R::Record>> {
    Ok(Json(R::update(&state, &caller, id, input.into()).await?))
}

async fn modify<R: Resource>(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
    ValidatedJson(patch): ValidatedJson<R::Patch>,
) -> Result<Json<R::Record>> {
    Ok(Json(R::update(&state, &caller, id, patch).await?))
}

async fn destroy<R: Resource>(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    R::delete(&state, &caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Tables a writable foreign-key field can point at.
#[derive(Clone, Copy, Debug)]
pub enum Referenced {
    Users,
    Skills,
}

impl Referenced {
    fn table(self) -> &'static str {
        match self {
            Referenced::Users => "users",
            Referenced::Skills => "skills",
        }
    }
}

/// Rejects an unknown id in a foreign-key field as a per-field input error.
pub async fn ensure_exists(
    pool: &SqlitePool,
    target: Referenced,
    id: i64,
    field: &str,
) -> Result<()> {
    let query = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?)", target.table());
    let exists = sqlx::query_scalar::<_, i64>(&query)
        .bind(id)
        .fetch_one(pool)
        .await?;

    if exists != 0 {
        Ok(())
    } else {
        Err(invalid_pk(field, id))
    }
}

pub fn invalid_pk(field: &str, id: i64) -> AppError {
    AppError::field(field, format!("Invalid pk \"{id}\" - object does not exist."))
}

/// Distinguishes an absent key (`None`) from an explicit `null`
/// (`Some(None)`) in PATCH bodies.
pub fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        photo: Option<Option<String>>,
    }

    #[test]
    fn nullable_keeps_absent_and_null_apart() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        let null: Patch = serde_json::from_str(r#"{"photo": null}"#).unwrap();
        let set: Patch = serde_json::from_str(r#"{"photo": "a.png"}"#).unwrap();
        assert_eq!(absent.photo, None);
        assert_eq!(null.photo, Some(None));
        assert_eq!(set.photo, Some(Some("a.png".to_string())));
    }
}
