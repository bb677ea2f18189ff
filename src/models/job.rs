use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{FromRow, PgPool};

use crate::error::ApiError;
use crate::models::company::Company;
use crate::sql::{bind_typed, bind_value, partial_update, Column, WhereBuilder};

/// Updatable fields. The id and owning company are fixed at creation.
const UPDATE_COLUMNS: &[Column] = &[
    Column::text("title", "title"),
    Column::integer("salary", "salary"),
    Column::numeric("equity", "equity"),
];

// equity is NUMERIC; it travels as text so the API serializes it as the
// decimal string clients expect.
const RETURNING: &str = "id, title, salary, equity::text AS equity, company_handle";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: i32,
    pub title: String,
    pub salary: Option<i32>,
    pub equity: Option<String>,
    pub company_handle: String,
}

/// Search-result row; carries the company name from the join.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct JobListing {
    pub id: i32,
    pub title: String,
    pub salary: Option<i32>,
    pub equity: Option<String>,
    pub company_handle: String,
    pub company_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JobNew {
    pub title: String,
    #[serde(default)]
    pub salary: Option<i32>,
    #[serde(default)]
    pub equity: Option<f64>,
    pub company_handle: String,
}

/// Optional search criteria; any subset (including none) is valid.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JobSearch {
    pub min_salary: Option<i32>,
    pub has_equity: Option<bool>,
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetail {
    pub id: i32,
    pub title: String,
    pub salary: Option<i32>,
    pub equity: Option<String>,
    pub company: Company,
}

impl Job {
    pub async fn create(pool: &PgPool, data: &JobNew) -> Result<Job, ApiError> {
        let sql = format!(
            "INSERT INTO jobs (title, salary, equity, company_handle)
             VALUES ($1, $2, $3, $4)
             RETURNING {RETURNING}"
        );
        let job = sqlx::query_as::<_, Job>(&sql)
            .bind(&data.title)
            .bind(data.salary)
            .bind(data.equity)
            .bind(&data.company_handle)
            .fetch_one(pool)
            .await?;

        Ok(job)
    }

    /// Find all jobs matching the optional filters, ordered by title.
    pub async fn find_all(pool: &PgPool, filters: &JobSearch) -> Result<Vec<JobListing>, ApiError> {
        let (sql, values) = Self::search_query(filters);

        let mut query = sqlx::query_as::<_, JobListing>(&sql);
        for value in &values {
            query = bind_value(query, value);
        }
        Ok(query.fetch_all(pool).await?)
    }

    /// Build the search SQL and its parameter list.
    ///
    /// Predicates are checked in a fixed order (minSalary, hasEquity, title).
    /// hasEquity is a flag filter: true adds a literal `equity > 0` predicate
    /// and binds nothing; false or absent adds nothing.
    fn search_query(filters: &JobSearch) -> (String, Vec<Value>) {
        let mut where_builder = WhereBuilder::new();
        if let Some(min_salary) = filters.min_salary {
            where_builder.at_least("salary", min_salary);
        }
        if filters.has_equity == Some(true) {
            where_builder.literal("equity > 0");
        }
        if let Some(title) = &filters.title {
            where_builder.contains("title", title);
        }

        let sql = format!(
            "SELECT j.id, j.title, j.salary, j.equity::text AS equity,
                    j.company_handle, c.name AS company_name
             FROM jobs j
               LEFT JOIN companies AS c ON c.handle = j.company_handle{} ORDER BY title",
            where_builder.clause()
        );
        (sql, where_builder.into_parts().1)
    }

    /// Fetch one job with its company embedded.
    pub async fn get(pool: &PgPool, id: i32) -> Result<JobDetail, ApiError> {
        let sql = format!("SELECT {RETURNING} FROM jobs WHERE id = $1");
        let job = sqlx::query_as::<_, Job>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("No job: {id}")))?;

        let company = sqlx::query_as::<_, Company>(
            "SELECT handle, name, description, num_employees, logo_url
             FROM companies WHERE handle = $1",
        )
        .bind(&job.company_handle)
        .fetch_one(pool)
        .await?;

        Ok(JobDetail {
            id: job.id,
            title: job.title,
            salary: job.salary,
            equity: job.equity,
            company,
        })
    }

    /// Partial update; only the fields present in `data` change.
    pub async fn update(pool: &PgPool, id: i32, data: &Map<String, Value>) -> Result<Job, ApiError> {
        let (set_cols, values) = partial_update(data, UPDATE_COLUMNS)?;

        let sql = format!(
            "UPDATE jobs SET {set_cols} WHERE id = ${} RETURNING {RETURNING}",
            values.len() + 1
        );

        let mut query = sqlx::query_as::<_, Job>(&sql);
        for value in &values {
            query = bind_typed(query, value);
        }
        query
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("No job: {id}")))
    }

    pub async fn remove(pool: &PgPool, id: i32) -> Result<(), ApiError> {
        let deleted = sqlx::query("DELETE FROM jobs WHERE id = $1 RETURNING id")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        if deleted.is_none() {
            return Err(ApiError::not_found(format!("No job: {id}")));
        }
        Ok(())
    }
}
