//! Parameterized SQL fragment construction.
//!
//! Two builders are shared by every resource model: `partial_update` turns a
//! sparse field map into a SET fragment, and `WhereBuilder` turns optional
//! search criteria into AND-joined predicates. Both emit positional
//! placeholders aligned 1:1 with a returned value list; values are never
//! concatenated into query text, and column names come only from the static
//! tables the models own.

use serde_json::{Map, Value};
use sqlx::postgres::PgArguments;
use sqlx::FromRow;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SqlError {
    #[error("No data to update")]
    EmptyUpdate,

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Invalid value for field {field}: expected {expected}")]
    InvalidValue {
        field: String,
        expected: &'static str,
    },
}

/// Value type of an updatable column, used to validate payload values and to
/// bind parameters (nulls included) with the column's Postgres type rather
/// than letting everything default to text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Numeric,
    Boolean,
}

impl ColumnType {
    fn expected(self) -> &'static str {
        match self {
            ColumnType::Text => "a string",
            ColumnType::Integer => "an integer",
            ColumnType::Numeric => "a number",
            ColumnType::Boolean => "a boolean",
        }
    }

    /// Explicit null is always acceptable; set-to-null is a legal update.
    fn accepts(self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            ColumnType::Text => value.is_string(),
            ColumnType::Integer => value.as_i64().is_some(),
            ColumnType::Numeric => value.is_number(),
            ColumnType::Boolean => value.is_boolean(),
        }
    }
}

/// One updatable column: logical (API) field name, physical column name, and
/// the value type the column stores.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    logical: &'static str,
    physical: &'static str,
    ty: ColumnType,
}

impl Column {
    pub const fn text(logical: &'static str, physical: &'static str) -> Self {
        Self { logical, physical, ty: ColumnType::Text }
    }

    pub const fn integer(logical: &'static str, physical: &'static str) -> Self {
        Self { logical, physical, ty: ColumnType::Integer }
    }

    pub const fn numeric(logical: &'static str, physical: &'static str) -> Self {
        Self { logical, physical, ty: ColumnType::Numeric }
    }

    pub const fn boolean(logical: &'static str, physical: &'static str) -> Self {
        Self { logical, physical, ty: ColumnType::Boolean }
    }
}

/// A parameter value tagged with its column's type so it binds correctly.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlValue {
    pub value: Value,
    pub ty: ColumnType,
}

/// Build a parameterized SET fragment for a partial update.
///
/// Keys are taken in payload order; each resolves to its physical column via
/// `columns` and is assigned the next placeholder, so the returned values line
/// up 1:1 with `$1..$N`. Callers appending more parameters (a row id in the
/// WHERE clause, say) number them from `values.len() + 1`.
///
/// The column table is an exhaustive allow-list: a payload key without an
/// entry is rejected rather than used verbatim in identifier position, and a
/// value that doesn't match the column's type is rejected here instead of
/// surfacing as a database type error.
///
/// ```
/// use serde_json::{json, Map};
/// use jobly_api::sql::{partial_update, Column};
///
/// let mut data = Map::new();
/// data.insert("firstName".into(), json!("Aliyaah"));
/// data.insert("age".into(), json!(37));
///
/// let columns = &[Column::text("firstName", "first_name"), Column::integer("age", "age")];
/// let (set_cols, values) = partial_update(&data, columns).unwrap();
/// assert_eq!(set_cols, r#""first_name"=$1, "age"=$2"#);
/// assert_eq!(values[0].value, json!("Aliyaah"));
/// assert_eq!(values[1].value, json!(37));
/// ```
pub fn partial_update(
    data: &Map<String, Value>,
    columns: &[Column],
) -> Result<(String, Vec<SqlValue>), SqlError> {
    if data.is_empty() {
        return Err(SqlError::EmptyUpdate);
    }

    let mut set_cols = Vec::with_capacity(data.len());
    let mut values = Vec::with_capacity(data.len());

    for (idx, (field, value)) in data.iter().enumerate() {
        let column = columns
            .iter()
            .find(|column| column.logical == field.as_str())
            .ok_or_else(|| SqlError::UnknownField(field.clone()))?;

        if !column.ty.accepts(value) {
            return Err(SqlError::InvalidValue {
                field: field.clone(),
                expected: column.ty.expected(),
            });
        }

        set_cols.push(format!("\"{}\"=${}", column.physical, idx + 1));
        values.push(SqlValue {
            value: value.clone(),
            ty: column.ty,
        });
    }

    Ok((set_cols.join(", "), values))
}

/// Accumulates optional search predicates into parameterized fragments.
///
/// Models call the push methods in a fixed order per resource, so generated
/// SQL text is deterministic for a given filter set no matter how the request
/// happened to order its keys. An empty builder contributes no WHERE clause.
#[derive(Debug, Default)]
pub struct WhereBuilder {
    fragments: Vec<String>,
    values: Vec<Value>,
}

impl WhereBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_index(&self) -> usize {
        self.values.len() + 1
    }

    /// `column >= $n`
    pub fn at_least(&mut self, column: &str, value: impl Into<Value>) {
        self.fragments.push(format!("{} >= ${}", column, self.next_index()));
        self.values.push(value.into());
    }

    /// `column <= $n`
    pub fn at_most(&mut self, column: &str, value: impl Into<Value>) {
        self.fragments.push(format!("{} <= ${}", column, self.next_index()));
        self.values.push(value.into());
    }

    /// Case-insensitive substring match: `column ILIKE $n` with the needle
    /// wrapped in wildcards before binding.
    pub fn contains(&mut self, column: &str, needle: &str) {
        self.fragments.push(format!("{} ILIKE ${}", column, self.next_index()));
        self.values.push(Value::String(format!("%{}%", needle)));
    }

    /// Fixed predicate with no bound value; consumes no placeholder index.
    pub fn literal(&mut self, predicate: &str) {
        self.fragments.push(predicate.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// ` WHERE a AND b` (with leading space), or an empty string when no
    /// predicates were pushed, for direct appending to a base query.
    pub fn clause(&self) -> String {
        if self.fragments.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.fragments.join(" AND "))
        }
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Value>) {
        (self.fragments, self.values)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

/// Bind a JSON value to the next placeholder of a `query_as` query.
///
/// Filter fragments carry heterogeneous parameter lists, so values travel as
/// `serde_json::Value` until they hit sqlx here. Filter values are never
/// null; typed nulls from the update builder go through `bind_typed`.
pub fn bind_value<'q, O>(
    q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>,
    v: &'q Value,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, sqlx::postgres::PgRow>,
{
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        // Composite values never reach the builders; bind as JSONB if one does
        _ => q.bind(v.clone()),
    }
}

/// Bind an update-builder value using its column's type, so an explicit null
/// is declared with that type instead of text and assigns cleanly to integer,
/// numeric and boolean columns.
pub fn bind_typed<'q, O>(
    q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>,
    v: &'q SqlValue,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, sqlx::postgres::PgRow>,
{
    match v.ty {
        ColumnType::Text => q.bind(v.value.as_str()),
        ColumnType::Integer => q.bind(v.value.as_i64()),
        ColumnType::Numeric => q.bind(v.value.as_f64()),
        ColumnType::Boolean => q.bind(v.value.as_bool()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(pairs: Vec<(&str, Value)>) -> Map<String, Value> {
        let mut m = Map::new();
        for (k, v) in pairs {
            m.insert(k.to_string(), v);
        }
        m
    }

    fn raw(values: &[SqlValue]) -> Vec<Value> {
        values.iter().map(|v| v.value.clone()).collect()
    }

    const USER_COLS: &[Column] = &[
        Column::text("firstName", "first_name"),
        Column::text("lastName", "last_name"),
        Column::integer("age", "age"),
    ];

    #[test]
    fn partial_update_translates_and_numbers_columns() {
        let data = map(vec![("firstName", json!("Aliyaah")), ("age", json!(37))]);
        let (set_cols, values) = partial_update(&data, USER_COLS).unwrap();
        assert_eq!(set_cols, r#""first_name"=$1, "age"=$2"#);
        assert_eq!(raw(&values), vec![json!("Aliyaah"), json!(37)]);
    }

    #[test]
    fn partial_update_placeholders_match_value_order() {
        let data = map(vec![
            ("lastName", json!("B")),
            ("firstName", json!("A")),
            ("age", json!(1)),
        ]);
        let (set_cols, values) = partial_update(&data, USER_COLS).unwrap();

        assert_eq!(values.len(), 3);
        for n in 1..=3 {
            assert_eq!(set_cols.matches(&format!("${}", n)).count(), 1);
        }
        // Payload order drives both the fragment and the value list
        assert_eq!(set_cols, r#""last_name"=$1, "first_name"=$2, "age"=$3"#);
        assert_eq!(raw(&values), vec![json!("B"), json!("A"), json!(1)]);
    }

    #[test]
    fn partial_update_keeps_explicit_null_with_column_type() {
        // A null must carry its column's type so it doesn't bind as text
        let data = map(vec![("age", Value::Null), ("firstName", Value::Null)]);
        let (set_cols, values) = partial_update(&data, USER_COLS).unwrap();
        assert_eq!(set_cols, r#""age"=$1, "first_name"=$2"#);
        assert_eq!(values[0], SqlValue { value: Value::Null, ty: ColumnType::Integer });
        assert_eq!(values[1], SqlValue { value: Value::Null, ty: ColumnType::Text });
    }

    #[test]
    fn partial_update_rejects_empty_payload() {
        assert_eq!(partial_update(&Map::new(), USER_COLS), Err(SqlError::EmptyUpdate));
        assert_eq!(partial_update(&Map::new(), &[]), Err(SqlError::EmptyUpdate));
    }

    #[test]
    fn partial_update_rejects_untranslated_field() {
        let data = map(vec![("age", json!(5))]);
        assert_eq!(
            partial_update(&data, &[]),
            Err(SqlError::UnknownField("age".to_string()))
        );

        // Unknown keys are rejected even when mixed with known ones
        let data = map(vec![("firstName", json!("A")), ("handle", json!("x"))]);
        assert_eq!(
            partial_update(&data, USER_COLS),
            Err(SqlError::UnknownField("handle".to_string()))
        );
    }

    #[test]
    fn partial_update_rejects_wrong_typed_values() {
        let data = map(vec![("firstName", json!(5))]);
        assert_eq!(
            partial_update(&data, USER_COLS),
            Err(SqlError::InvalidValue { field: "firstName".to_string(), expected: "a string" })
        );

        let data = map(vec![("age", json!("ten"))]);
        assert_eq!(
            partial_update(&data, USER_COLS),
            Err(SqlError::InvalidValue { field: "age".to_string(), expected: "an integer" })
        );

        // Fractional values don't fit an integer column either
        let data = map(vec![("age", json!(3.5))]);
        assert!(matches!(
            partial_update(&data, USER_COLS),
            Err(SqlError::InvalidValue { .. })
        ));
    }

    #[test]
    fn numeric_columns_accept_integers_and_fractions() {
        let cols = &[Column::numeric("equity", "equity")];
        for value in [json!(0), json!(0.5), Value::Null] {
            let data = map(vec![("equity", value)]);
            let (_, values) = partial_update(&data, cols).unwrap();
            assert_eq!(values[0].ty, ColumnType::Numeric);
        }

        let data = map(vec![("equity", json!("0.5"))]);
        assert!(matches!(
            partial_update(&data, cols),
            Err(SqlError::InvalidValue { .. })
        ));
    }

    #[test]
    fn where_builder_empty_yields_no_clause() {
        let wb = WhereBuilder::new();
        assert!(wb.is_empty());
        assert_eq!(wb.clause(), "");
        let (fragments, values) = wb.into_parts();
        assert!(fragments.is_empty());
        assert!(values.is_empty());
    }

    #[test]
    fn where_builder_joins_with_and_in_push_order() {
        let mut wb = WhereBuilder::new();
        wb.at_least("salary", 100);
        wb.contains("title", "eng");
        assert_eq!(wb.clause(), " WHERE salary >= $1 AND title ILIKE $2");
        assert_eq!(wb.values(), &[json!(100), json!("%eng%")]);
    }

    #[test]
    fn where_builder_literal_consumes_no_placeholder() {
        let mut wb = WhereBuilder::new();
        wb.at_least("salary", 100);
        wb.literal("equity > 0");
        wb.contains("title", "dev");
        let (fragments, values) = wb.into_parts();
        assert_eq!(
            fragments,
            vec!["salary >= $1", "equity > 0", "title ILIKE $2"]
        );
        assert_eq!(values, vec![json!(100), json!("%dev%")]);
    }

    #[test]
    fn where_builder_range_pair() {
        let mut wb = WhereBuilder::new();
        wb.at_least("num_employees", 2);
        wb.at_most("num_employees", 10);
        assert_eq!(wb.clause(), " WHERE num_employees >= $1 AND num_employees <= $2");
        assert_eq!(wb.values(), &[json!(2), json!(10)]);
    }
}
