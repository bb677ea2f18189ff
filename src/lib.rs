pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod sql;
pub mod state;

use axum::{
    handler::Handler,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{authenticate, require_admin, require_self_or_admin};
use crate::state::AppState;

/// Build the full application router.
///
/// Every request passes through `authenticate` (which only populates the
/// per-request `Identity`); routes that need more than anonymous access
/// declare a guard on the individual handler.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(auth_routes())
        .merge(company_routes())
        .merge(job_routes())
        .merge(user_routes())
        .layer(from_fn_with_state(state.tokens.clone(), authenticate))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn auth_routes() -> Router<AppState> {
    use handlers::auth;

    Router::new()
        .route("/auth/token", post(auth::token))
        .route("/auth/register", post(auth::register))
}

fn company_routes() -> Router<AppState> {
    use handlers::companies;

    Router::new()
        .route(
            "/companies",
            get(companies::list).post(companies::create.layer(from_fn(require_admin))),
        )
        .route(
            "/companies/:handle",
            get(companies::show)
                .patch(companies::update.layer(from_fn(require_admin)))
                .delete(companies::remove.layer(from_fn(require_admin))),
        )
}

fn job_routes() -> Router<AppState> {
    use handlers::jobs;

    Router::new()
        .route(
            "/jobs",
            get(jobs::list).post(jobs::create.layer(from_fn(require_admin))),
        )
        .route(
            "/jobs/:id",
            get(jobs::show)
                .patch(jobs::update.layer(from_fn(require_admin)))
                .delete(jobs::remove.layer(from_fn(require_admin))),
        )
}

fn user_routes() -> Router<AppState> {
    use handlers::users;

    Router::new()
        .route(
            "/users",
            get(users::list.layer(from_fn(require_admin)))
                .post(users::create.layer(from_fn(require_admin))),
        )
        .route(
            "/users/:username",
            get(users::show.layer(from_fn(require_self_or_admin)))
                .patch(users::update.layer(from_fn(require_self_or_admin)))
                .delete(users::remove.layer(from_fn(require_self_or_admin))),
        )
        .route(
            "/users/:username/jobs/:id",
            post(users::apply.layer(from_fn(require_self_or_admin))),
        )
}
