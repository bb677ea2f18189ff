use std::collections::HashMap;

use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};

use crate::auth::{bearer_token, Claims, TokenService};
use crate::error::ApiError;

/// Authenticated user context extracted from a verified token.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub username: String,
    pub is_admin: bool,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            username: claims.username,
            is_admin: claims.is_admin,
        }
    }
}

/// Per-request identity slot, written exactly once by `authenticate` before
/// any guard runs. Absent user means the request is anonymous.
#[derive(Clone, Debug, Default)]
pub struct Identity(Option<AuthUser>);

impl Identity {
    pub fn anonymous() -> Self {
        Self(None)
    }

    pub fn authenticated(user: AuthUser) -> Self {
        Self(Some(user))
    }

    pub fn user(&self) -> Option<&AuthUser> {
        self.0.as_ref()
    }
}

/// Authentication middleware: resolve the bearer credential (if any) into an
/// `Identity` request extension.
///
/// A missing header and an invalid token (bad signature, malformed payload)
/// are treated identically: the request continues as anonymous. Whether
/// anonymous is acceptable is decided per route by the guards below, never
/// here.
pub async fn authenticate(
    State(tokens): State<TokenService>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = bearer_token(request.headers())
        .and_then(|token| tokens.verify(token).ok())
        .map(AuthUser::from)
        .map_or_else(Identity::anonymous, Identity::authenticated);

    request.extensions_mut().insert(identity);
    next.run(request).await
}

fn identity(request: &Request) -> Option<&AuthUser> {
    request.extensions().get::<Identity>().and_then(Identity::user)
}

/// Guard: the request must carry a verified identity.
pub async fn require_authenticated(request: Request, next: Next) -> Result<Response, ApiError> {
    if identity(&request).is_none() {
        return Err(ApiError::unauthorized());
    }
    Ok(next.run(request).await)
}

/// Guard: the request must carry a verified admin identity.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    match identity(&request) {
        Some(user) if user.is_admin => Ok(next.run(request).await),
        _ => Err(ApiError::unauthorized()),
    }
}

/// Guard: the request must carry a verified identity that is either an admin
/// or the user named by the `:username` route parameter.
///
/// Identity comes exclusively from the `Identity` extension; route or body
/// data never establish who the caller is.
pub async fn require_self_or_admin(
    Path(params): Path<HashMap<String, String>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let allowed = match (identity(&request), params.get("username")) {
        (Some(user), Some(username)) => user.is_admin || &user.username == username,
        (Some(user), None) => user.is_admin,
        _ => false,
    };

    if !allowed {
        return Err(ApiError::unauthorized());
    }
    Ok(next.run(request).await)
}
