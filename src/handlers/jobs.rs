use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Map, Value};
use sqlx::PgPool;

use crate::error::ApiError;
use crate::models::job::{JobNew, JobSearch};
use crate::models::Job;

/// POST /jobs - admin only.
pub async fn create(
    State(pool): State<PgPool>,
    Json(body): Json<JobNew>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let job = Job::create(&pool, &body).await?;
    Ok((StatusCode::CREATED, Json(json!({ "job": job }))))
}

/// GET /jobs - open; optional minSalary/hasEquity/title filters.
pub async fn list(
    State(pool): State<PgPool>,
    Query(filters): Query<JobSearch>,
) -> Result<Json<Value>, ApiError> {
    let jobs = Job::find_all(&pool, &filters).await?;
    Ok(Json(json!({ "jobs": jobs })))
}

/// GET /jobs/:id - open; includes the owning company.
pub async fn show(
    State(pool): State<PgPool>,
    Path(id): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    let job = Job::get(&pool, id).await?;
    Ok(Json(json!({ "job": job })))
}

/// PATCH /jobs/:id - admin only, sparse update.
pub async fn update(
    State(pool): State<PgPool>,
    Path(id): Path<i32>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<Value>, ApiError> {
    let job = Job::update(&pool, id, &body).await?;
    Ok(Json(json!({ "job": job })))
}

/// DELETE /jobs/:id - admin only.
pub async fn remove(
    State(pool): State<PgPool>,
    Path(id): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    Job::remove(&pool, id).await?;
    Ok(Json(json!({ "deleted": id })))
}
