pub mod auth;
pub mod companies;
pub mod jobs;
pub mod users;
