use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{FromRow, PgPool};

use crate::error::ApiError;
use crate::sql::{bind_typed, bind_value, partial_update, Column, WhereBuilder};

/// Logical (API) field -> physical column, for partial updates. The handle is
/// the primary key and is not updatable. This table doubles as the allow-list:
/// any other payload key is rejected by the update builder, as is any value
/// that doesn't match the column's type.
const UPDATE_COLUMNS: &[Column] = &[
    Column::text("name", "name"),
    Column::text("description", "description"),
    Column::integer("numEmployees", "num_employees"),
    Column::text("logoUrl", "logo_url"),
];

const RETURNING: &str = "handle, name, description, num_employees, logo_url";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub handle: String,
    pub name: String,
    pub description: String,
    pub num_employees: Option<i32>,
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CompanyNew {
    pub handle: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub num_employees: Option<i32>,
    #[serde(default)]
    pub logo_url: Option<String>,
}

/// Optional search criteria; any subset (including none) is valid.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CompanySearch {
    pub min_employees: Option<i32>,
    pub max_employees: Option<i32>,
    pub name_like: Option<String>,
}

/// Job row embedded in a company detail response.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CompanyJob {
    pub id: i32,
    pub title: String,
    pub salary: Option<i32>,
    pub equity: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompanyDetail {
    #[serde(flatten)]
    pub company: Company,
    pub jobs: Vec<CompanyJob>,
}

impl Company {
    /// Create a company; duplicate handles are a conflict.
    pub async fn create(pool: &PgPool, data: &CompanyNew) -> Result<Company, ApiError> {
        let existing = sqlx::query("SELECT handle FROM companies WHERE handle = $1")
            .bind(&data.handle)
            .fetch_optional(pool)
            .await?;
        if existing.is_some() {
            return Err(ApiError::conflict(format!("Duplicate company: {}", data.handle)));
        }

        let sql = format!(
            "INSERT INTO companies (handle, name, description, num_employees, logo_url)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {RETURNING}"
        );
        let company = sqlx::query_as::<_, Company>(&sql)
            .bind(&data.handle)
            .bind(&data.name)
            .bind(&data.description)
            .bind(data.num_employees)
            .bind(&data.logo_url)
            .fetch_one(pool)
            .await?;

        Ok(company)
    }

    /// Find all companies matching the optional filters, ordered by name.
    pub async fn find_all(pool: &PgPool, filters: &CompanySearch) -> Result<Vec<Company>, ApiError> {
        let (sql, values) = Self::search_query(filters)?;

        let mut query = sqlx::query_as::<_, Company>(&sql);
        for value in &values {
            query = bind_value(query, value);
        }
        Ok(query.fetch_all(pool).await?)
    }

    /// Build the search SQL and its parameter list.
    ///
    /// Predicates are checked in a fixed order (min, max, name) so the
    /// generated text is deterministic for a given filter set.
    fn search_query(filters: &CompanySearch) -> Result<(String, Vec<Value>), ApiError> {
        if let (Some(min), Some(max)) = (filters.min_employees, filters.max_employees) {
            if min > max {
                return Err(ApiError::bad_request("minEmployees cannot be greater than maxEmployees"));
            }
        }

        let mut where_builder = WhereBuilder::new();
        if let Some(min) = filters.min_employees {
            where_builder.at_least("num_employees", min);
        }
        if let Some(max) = filters.max_employees {
            where_builder.at_most("num_employees", max);
        }
        if let Some(name) = &filters.name_like {
            where_builder.contains("name", name);
        }

        let sql = format!(
            "SELECT {RETURNING} FROM companies{} ORDER BY name",
            where_builder.clause()
        );
        Ok((sql, where_builder.into_parts().1))
    }

    /// Fetch one company with its jobs.
    pub async fn get(pool: &PgPool, handle: &str) -> Result<CompanyDetail, ApiError> {
        let sql = format!("SELECT {RETURNING} FROM companies WHERE handle = $1");
        let company = sqlx::query_as::<_, Company>(&sql)
            .bind(handle)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("No company: {handle}")))?;

        let jobs = sqlx::query_as::<_, CompanyJob>(
            "SELECT id, title, salary, equity::text AS equity
             FROM jobs WHERE company_handle = $1 ORDER BY id",
        )
        .bind(handle)
        .fetch_all(pool)
        .await?;

        Ok(CompanyDetail { company, jobs })
    }

    /// Partial update; only the fields present in `data` change.
    pub async fn update(
        pool: &PgPool,
        handle: &str,
        data: &Map<String, Value>,
    ) -> Result<Company, ApiError> {
        let (set_cols, values) = partial_update(data, UPDATE_COLUMNS)?;

        let sql = format!(
            "UPDATE companies SET {set_cols} WHERE handle = ${} RETURNING {RETURNING}",
            values.len() + 1
        );

        let mut query = sqlx::query_as::<_, Company>(&sql);
        for value in &values {
            query = bind_typed(query, value);
        }
        query
            .bind(handle)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("No company: {handle}")))
    }

    pub async fn remove(pool: &PgPool, handle: &str) -> Result<(), ApiError> {
        let deleted = sqlx::query("DELETE FROM companies WHERE handle = $1 RETURNING handle")
            .bind(handle)
            .fetch_optional(pool)
            .await?;
        if deleted.is_none() {
            return Err(ApiError::not_found(format!("No company: {handle}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn search_query_without_filters_has_no_where() {
        let (sql, values) = Company::search_query(&CompanySearch::default()).unwrap();
        assert!(!sql.contains("WHERE"));
        assert!(sql.ends_with("ORDER BY name"));
        assert!(values.is_empty());
    }

    #[test]
    fn search_query_orders_predicates_min_max_name() {
        let filters = CompanySearch {
            min_employees: Some(2),
            max_employees: Some(10),
            name_like: Some("net".to_string()),
        };
        let (sql, values) = Company::search_query(&filters).unwrap();
        assert!(sql.contains(
            "WHERE num_employees >= $1 AND num_employees <= $2 AND name ILIKE $3"
        ));
        assert_eq!(values, vec![json!(2), json!(10), json!("%net%")]);
    }

    #[test]
    fn search_query_substring_only() {
        let filters = CompanySearch {
            name_like: Some("c1".to_string()),
            ..Default::default()
        };
        let (sql, values) = Company::search_query(&filters).unwrap();
        assert!(sql.contains("WHERE name ILIKE $1"));
        assert_eq!(values, vec![json!("%c1%")]);
    }

    #[test]
    fn search_query_rejects_inverted_range() {
        let filters = CompanySearch {
            min_employees: Some(10),
            max_employees: Some(2),
            ..Default::default()
        };
        let err = Company::search_query(&filters).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn search_deserialization_rejects_unknown_keys() {
        let result: Result<CompanySearch, _> =
            serde_json::from_value(json!({ "minEmployees": 1, "bogus": true }));
        assert!(result.is_err());
    }

    #[test]
    fn update_rejects_handle_change() {
        let mut data = Map::new();
        data.insert("handle".to_string(), json!("new-handle"));
        let err = partial_update(&data, UPDATE_COLUMNS).unwrap_err();
        assert_eq!(err, crate::sql::SqlError::UnknownField("handle".to_string()));
    }

    #[test]
    fn update_accepts_null_num_employees_as_integer() {
        // Clearing numEmployees must bind as an integer null, not text
        let mut data = Map::new();
        data.insert("numEmployees".to_string(), Value::Null);
        let (set_cols, values) = partial_update(&data, UPDATE_COLUMNS).unwrap();
        assert_eq!(set_cols, r#""num_employees"=$1"#);
        assert_eq!(values[0].value, Value::Null);
        assert_eq!(values[0].ty, crate::sql::ColumnType::Integer);
    }

    #[test]
    fn update_rejects_wrong_typed_values() {
        let mut data = Map::new();
        data.insert("numEmployees".to_string(), json!("ten"));
        let err = partial_update(&data, UPDATE_COLUMNS).unwrap_err();
        assert_eq!(ApiError::from(err).status_code(), 400);

        let mut data = Map::new();
        data.insert("name".to_string(), json!(5));
        let err = partial_update(&data, UPDATE_COLUMNS).unwrap_err();
        assert_eq!(ApiError::from(err).status_code(), 400);
    }
}
