use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Map, Value};
use sqlx::PgPool;

use crate::error::ApiError;
use crate::models::company::{CompanyNew, CompanySearch};
use crate::models::Company;

/// POST /companies - admin only.
pub async fn create(
    State(pool): State<PgPool>,
    Json(body): Json<CompanyNew>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let company = Company::create(&pool, &body).await?;
    Ok((StatusCode::CREATED, Json(json!({ "company": company }))))
}

/// GET /companies - open; optional minEmployees/maxEmployees/nameLike filters.
pub async fn list(
    State(pool): State<PgPool>,
    Query(filters): Query<CompanySearch>,
) -> Result<Json<Value>, ApiError> {
    let companies = Company::find_all(&pool, &filters).await?;
    Ok(Json(json!({ "companies": companies })))
}

/// GET /companies/:handle - open; includes the company's jobs.
pub async fn show(
    State(pool): State<PgPool>,
    Path(handle): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let company = Company::get(&pool, &handle).await?;
    Ok(Json(json!({ "company": company })))
}

/// PATCH /companies/:handle - admin only, sparse update.
pub async fn update(
    State(pool): State<PgPool>,
    Path(handle): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<Value>, ApiError> {
    let company = Company::update(&pool, &handle, &body).await?;
    Ok(Json(json!({ "company": company })))
}

/// DELETE /companies/:handle - admin only.
pub async fn remove(
    State(pool): State<PgPool>,
    Path(handle): Path<String>,
) -> Result<Json<Value>, ApiError> {
    Company::remove(&pool, &handle).await?;
    Ok(Json(json!({ "deleted": handle })))
}
