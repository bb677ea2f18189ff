use axum::extract::FromRef;
use sqlx::PgPool;

use crate::auth::TokenService;

/// Shared application state: the database pool plus the token service built
/// from the configured secret.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub tokens: TokenService,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> PgPool {
        state.pool.clone()
    }
}

impl FromRef<AppState> for TokenService {
    fn from_ref(state: &AppState) -> TokenService {
        state.tokens.clone()
    }
}
