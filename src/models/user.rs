use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{FromRow, PgPool};

use crate::error::ApiError;
use crate::sql::{bind_typed, partial_update, Column};

/// Updatable fields. Admin status deliberately has no entry: a self-or-admin
/// route must not be able to grant privileges through a sparse update.
const UPDATE_COLUMNS: &[Column] = &[
    Column::text("firstName", "first_name"),
    Column::text("lastName", "last_name"),
    Column::text("password", "password"),
    Column::text("email", "email"),
];

const RETURNING: &str = "username, first_name, last_name, email, is_admin";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_admin: bool,
}

/// Row fetched for credential checks; the hash never leaves this module.
#[derive(Debug, FromRow)]
struct UserCredentials {
    username: String,
    password: String,
    first_name: String,
    last_name: String,
    email: String,
    is_admin: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UserNew {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    /// Ids of jobs the user has applied to.
    pub applications: Vec<i32>,
}

fn hash_password(password: &str, cost: u32) -> Result<String, ApiError> {
    bcrypt::hash(password, cost).map_err(|e| {
        tracing::error!("Password hashing failed: {}", e);
        ApiError::internal_server_error("An error occurred while processing your request")
    })
}

impl User {
    /// Create a user with a freshly hashed password; duplicate usernames are
    /// a conflict.
    pub async fn create(pool: &PgPool, data: &UserNew, bcrypt_cost: u32) -> Result<User, ApiError> {
        let existing = sqlx::query("SELECT username FROM users WHERE username = $1")
            .bind(&data.username)
            .fetch_optional(pool)
            .await?;
        if existing.is_some() {
            return Err(ApiError::conflict(format!("Duplicate username: {}", data.username)));
        }

        let hashed = hash_password(&data.password, bcrypt_cost)?;

        let sql = format!(
            "INSERT INTO users (username, password, first_name, last_name, email, is_admin)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {RETURNING}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(&data.username)
            .bind(&hashed)
            .bind(&data.first_name)
            .bind(&data.last_name)
            .bind(&data.email)
            .bind(data.is_admin)
            .fetch_one(pool)
            .await?;

        Ok(user)
    }

    /// Check a username/password pair against the stored hash.
    ///
    /// Unknown user and wrong password are indistinguishable to the caller.
    pub async fn authenticate(
        pool: &PgPool,
        username: &str,
        password: &str,
    ) -> Result<User, ApiError> {
        let sql = format!("SELECT password, {RETURNING} FROM users WHERE username = $1");
        let row = sqlx::query_as::<_, UserCredentials>(&sql)
            .bind(username)
            .fetch_optional(pool)
            .await?
            .ok_or_else(ApiError::unauthorized)?;

        let valid = bcrypt::verify(password, &row.password).unwrap_or(false);
        if !valid {
            return Err(ApiError::unauthorized());
        }

        Ok(User {
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            is_admin: row.is_admin,
        })
    }

    pub async fn find_all(pool: &PgPool) -> Result<Vec<User>, ApiError> {
        let sql = format!("SELECT {RETURNING} FROM users ORDER BY username");
        Ok(sqlx::query_as::<_, User>(&sql).fetch_all(pool).await?)
    }

    /// Fetch one user with the ids of jobs they applied to.
    pub async fn get(pool: &PgPool, username: &str) -> Result<UserDetail, ApiError> {
        let sql = format!("SELECT {RETURNING} FROM users WHERE username = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("No user: {username}")))?;

        let applications: Vec<i32> = sqlx::query_scalar(
            "SELECT job_id FROM applications WHERE username = $1 ORDER BY job_id",
        )
        .bind(username)
        .fetch_all(pool)
        .await?;

        Ok(UserDetail { user, applications })
    }

    /// Partial update; a new password is hashed before it reaches the
    /// update builder.
    pub async fn update(
        pool: &PgPool,
        username: &str,
        data: &Map<String, Value>,
        bcrypt_cost: u32,
    ) -> Result<User, ApiError> {
        let mut data = data.clone();
        if let Some(value) = data.get("password") {
            let password = value
                .as_str()
                .ok_or_else(|| ApiError::bad_request("password must be a string"))?;
            let hashed = hash_password(password, bcrypt_cost)?;
            data.insert("password".to_string(), Value::String(hashed));
        }

        let (set_cols, values) = partial_update(&data, UPDATE_COLUMNS)?;

        let sql = format!(
            "UPDATE users SET {set_cols} WHERE username = ${} RETURNING {RETURNING}",
            values.len() + 1
        );

        let mut query = sqlx::query_as::<_, User>(&sql);
        for value in &values {
            query = bind_typed(query, value);
        }
        query
            .bind(username)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("No user: {username}")))
    }

    pub async fn remove(pool: &PgPool, username: &str) -> Result<(), ApiError> {
        let deleted = sqlx::query("DELETE FROM users WHERE username = $1 RETURNING username")
            .bind(username)
            .fetch_optional(pool)
            .await?;
        if deleted.is_none() {
            return Err(ApiError::not_found(format!("No user: {username}")));
        }
        Ok(())
    }

    /// Record a job application; duplicates are a conflict.
    pub async fn apply_to_job(pool: &PgPool, username: &str, job_id: i32) -> Result<(), ApiError> {
        let user = sqlx::query("SELECT username FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(pool)
            .await?;
        if user.is_none() {
            return Err(ApiError::not_found(format!("No user: {username}")));
        }

        let job = sqlx::query("SELECT id FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(pool)
            .await?;
        if job.is_none() {
            return Err(ApiError::not_found(format!("No job: {job_id}")));
        }

        sqlx::query("INSERT INTO applications (username, job_id) VALUES ($1, $2)")
            .bind(username)
            .bind(job_id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // Low cost keeps the hashing tests fast; strength isn't under test.
    const TEST_COST: u32 = 4;

    #[test]
    fn hash_password_verifies_round_trip() {
        let hash = hash_password("password1", TEST_COST).unwrap();
        assert_ne!(hash, "password1");
        assert!(bcrypt::verify("password1", &hash).unwrap());
        assert!(!bcrypt::verify("password2", &hash).unwrap());
    }

    #[test]
    fn update_rejects_privilege_escalation() {
        let mut data = Map::new();
        data.insert("isAdmin".to_string(), json!(true));
        let err = partial_update(&data, UPDATE_COLUMNS).unwrap_err();
        assert_eq!(err, crate::sql::SqlError::UnknownField("isAdmin".to_string()));
    }

    #[test]
    fn update_translates_name_fields() {
        let mut data = Map::new();
        data.insert("firstName".to_string(), json!("A"));
        data.insert("email".to_string(), json!("a@b.c"));
        let (set_cols, values) = partial_update(&data, UPDATE_COLUMNS).unwrap();
        assert_eq!(set_cols, r#""first_name"=$1, "email"=$2"#);
        assert_eq!(values[0].value, json!("A"));
        assert_eq!(values[1].value, json!("a@b.c"));
    }

    #[test]
    fn update_rejects_non_string_name() {
        let mut data = Map::new();
        data.insert("firstName".to_string(), json!(5));
        let err = partial_update(&data, UPDATE_COLUMNS).unwrap_err();
        assert_eq!(crate::error::ApiError::from(err).status_code(), 400);
    }

    #[test]
    fn new_user_deserialization_defaults_is_admin_off() {
        let data: UserNew = serde_json::from_value(json!({
            "username": "test",
            "password": "password1",
            "firstName": "Test",
            "lastName": "User",
            "email": "test@example.com"
        }))
        .unwrap();
        assert!(!data.is_admin);
    }
}
