use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config;
use crate::error::ApiError;
use crate::models::user::UserNew;
use crate::models::User;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// POST /auth/token - exchange credentials for a token.
pub async fn token(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = User::authenticate(&state.pool, &body.username, &body.password).await?;
    let token = state.tokens.issue(&user.username, user.is_admin)?;
    Ok(Json(json!({ "token": token })))
}

/// POST /auth/register - self-service signup; never creates admins.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let data = UserNew {
        username: body.username,
        password: body.password,
        first_name: body.first_name,
        last_name: body.last_name,
        email: body.email,
        is_admin: false,
    };

    let bcrypt_cost = config::config().security.bcrypt_cost;
    let user = User::create(&state.pool, &data, bcrypt_cost).await?;
    let token = state.tokens.issue(&user.username, user.is_admin)?;
    Ok((StatusCode::CREATED, Json(json!({ "token": token }))))
}
