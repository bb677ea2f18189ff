use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Map, Value};
use sqlx::PgPool;

use crate::config;
use crate::error::ApiError;
use crate::models::user::UserNew;
use crate::models::User;
use crate::state::AppState;

/// POST /users - admin only; unlike /auth/register this can create admins
/// and returns a token the new user can be handed.
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<UserNew>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let bcrypt_cost = config::config().security.bcrypt_cost;
    let user = User::create(&state.pool, &body, bcrypt_cost).await?;
    let token = state.tokens.issue(&user.username, user.is_admin)?;
    Ok((StatusCode::CREATED, Json(json!({ "user": user, "token": token }))))
}

/// GET /users - admin only.
pub async fn list(State(pool): State<PgPool>) -> Result<Json<Value>, ApiError> {
    let users = User::find_all(&pool).await?;
    Ok(Json(json!({ "users": users })))
}

/// GET /users/:username - self or admin; includes job applications.
pub async fn show(
    State(pool): State<PgPool>,
    Path(username): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = User::get(&pool, &username).await?;
    Ok(Json(json!({ "user": user })))
}

/// PATCH /users/:username - self or admin, sparse update.
pub async fn update(
    State(pool): State<PgPool>,
    Path(username): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<Value>, ApiError> {
    let bcrypt_cost = config::config().security.bcrypt_cost;
    let user = User::update(&pool, &username, &body, bcrypt_cost).await?;
    Ok(Json(json!({ "user": user })))
}

/// DELETE /users/:username - self or admin.
pub async fn remove(
    State(pool): State<PgPool>,
    Path(username): Path<String>,
) -> Result<Json<Value>, ApiError> {
    User::remove(&pool, &username).await?;
    Ok(Json(json!({ "deleted": username })))
}

/// POST /users/:username/jobs/:id - self or admin; apply to a job.
pub async fn apply(
    State(pool): State<PgPool>,
    Path((username, job_id)): Path<(String, i32)>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    User::apply_to_job(&pool, &username, job_id).await?;
    Ok((StatusCode::CREATED, Json(json!({ "applied": job_id }))))
}
