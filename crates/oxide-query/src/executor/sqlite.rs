//! SQLite executor over a sqlx pool.

use serde_json::{Number, Value};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row, Sqlite, SqlitePool, TypeInfo, ValueRef};
use tracing::debug;

use super::{BoxFuture, ExecuteRequest, QueryExecutor};
use crate::error::{QueryError, Result, is_transient_database_error};
use crate::value::{Record, SqlValue};

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Executes statements on a [`SqlitePool`] and returns rows as JSON records.
#[derive(Debug, Clone)]
pub struct SqliteExecutor {
    pool: SqlitePool,
}

impl SqliteExecutor {
    /// Creates a new executor.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns the pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn statement<'q>(request: &ExecuteRequest<'q>) -> SqliteQuery<'q> {
        debug!(query = %request.query, sql = %request.text, params = request.params.len(), "Executing SQL");
        let mut query = sqlx::query(request.text);
        for param in request.params {
            query = bind_param(query, param.clone());
        }
        query
    }

    async fn fetch(&self, request: ExecuteRequest<'_>) -> Result<Vec<SqliteRow>> {
        Self::statement(&request)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| sqlx_error(&request, e))
    }

    async fn fetch_one(&self, request: ExecuteRequest<'_>) -> Result<Option<SqliteRow>> {
        Self::statement(&request)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| sqlx_error(&request, e))
    }
}

impl QueryExecutor for SqliteExecutor {
    fn select<'a>(&'a self, request: ExecuteRequest<'a>) -> BoxFuture<'a, Result<Vec<Record>>> {
        Box::pin(async move {
            self.fetch(request)
                .await?
                .iter()
                .map(|row| to_record(row).map_err(|e| sqlx_error(&request, e)))
                .collect()
        })
    }

    fn get<'a>(&'a self, request: ExecuteRequest<'a>) -> BoxFuture<'a, Result<Option<Record>>> {
        Box::pin(async move {
            self.fetch_one(request)
                .await?
                .as_ref()
                .map(to_record)
                .transpose()
                .map_err(|e| sqlx_error(&request, e))
        })
    }

    fn count<'a>(&'a self, request: ExecuteRequest<'a>) -> BoxFuture<'a, Result<u64>> {
        Box::pin(async move {
            let Some(row) = self.fetch_one(request).await? else {
                return Ok(0);
            };
            let count: i64 = row.try_get(0).map_err(|e| sqlx_error(&request, e))?;
            u64::try_from(count).map_err(|e| execution_error(&request, false, e))
        })
    }
}

fn execution_error(
    request: &ExecuteRequest<'_>,
    transient: bool,
    source: impl Into<crate::error::BoxError>,
) -> QueryError {
    QueryError::Execution {
        query: request.query.to_string(),
        text: request.text.to_string(),
        transient,
        source: source.into(),
    }
}

fn sqlx_error(request: &ExecuteRequest<'_>, source: sqlx::Error) -> QueryError {
    execution_error(request, is_transient_database_error(&source), source)
}

fn bind_param(query: SqliteQuery<'_>, param: SqlValue) -> SqliteQuery<'_> {
    match param {
        SqlValue::Null => query.bind(Option::<i64>::None),
        SqlValue::Bool(b) => query.bind(b),
        SqlValue::Int(i) => query.bind(i),
        SqlValue::Float(f) => query.bind(f),
        SqlValue::Text(s) => query.bind(s),
        SqlValue::Blob(b) => query.bind(b),
    }
}

/// Converts a row using the storage class of each value.
fn to_record(row: &SqliteRow) -> std::result::Result<Record, sqlx::Error> {
    let mut record = Record::new();
    for column in row.columns() {
        let index = column.ordinal();
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_ascii_uppercase();
            match type_name.as_str() {
                "INTEGER" | "INT" | "BIGINT" | "BOOLEAN" => Value::from(row.try_get::<i64, _>(index)?),
                "REAL" | "FLOAT" | "DOUBLE" => Number::from_f64(row.try_get::<f64, _>(index)?)
                    .map_or(Value::Null, Value::Number),
                "BLOB" => Value::from(row.try_get::<Vec<u8>, _>(index)?),
                "NUMERIC" => match row.try_get::<i64, _>(index) {
                    Ok(i) => Value::from(i),
                    Err(_) => Number::from_f64(row.try_get::<f64, _>(index)?)
                        .map_or(Value::Null, Value::Number),
                },
                _ => Value::String(row.try_get::<String, _>(index)?),
            }
        };
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}
