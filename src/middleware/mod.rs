pub mod auth;

pub use auth::{
    authenticate, require_admin, require_authenticated, require_self_or_admin, AuthUser, Identity,
};
