//! PostgreSQL Backend Implementation
//!
//! Implements the backend traits on top of a sqlx `PgPool`. Driver errors
//! are passed through untouched as `MigrationError::Database`.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgPool, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Executor, Postgres, Row, TypeInfo, ValueRef};

use super::core::*;
use crate::error::{MigrationError, MigrationResult};

/// PostgreSQL pool handle
///
/// Cloning is cheap; clones share the underlying sqlx pool.
#[derive(Debug, Clone)]
pub struct PostgresPool {
    pool: PgPool,
}

impl PostgresPool {
    /// Wrap an existing sqlx pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Validate the URL and connect a new pool
    pub async fn connect(database_url: &str) -> MigrationResult<Self> {
        validate_database_url(database_url)?;
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Get the underlying sqlx pool
    pub fn inner(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DatabasePool for PostgresPool {
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> MigrationResult<u64> {
        let result = bind_all(sqlx::query(sql), params)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn fetch_all(
        &self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> MigrationResult<Vec<Box<dyn DatabaseRow>>> {
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await?;
        Ok(box_rows(rows))
    }

    async fn begin(&self) -> MigrationResult<Box<dyn DatabaseTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction::new(tx)))
    }
}

/// PostgreSQL transaction implementation
pub struct PostgresTransaction {
    tx: Option<sqlx::Transaction<'static, Postgres>>,
}

impl PostgresTransaction {
    pub fn new(tx: sqlx::Transaction<'static, Postgres>) -> Self {
        Self { tx: Some(tx) }
    }

    fn inner(&mut self) -> MigrationResult<&mut sqlx::Transaction<'static, Postgres>> {
        self.tx.as_mut().ok_or(MigrationError::TransactionCompleted)
    }
}

#[async_trait]
impl DatabaseTransaction for PostgresTransaction {
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrationResult<u64> {
        let tx = self.inner()?;
        let result = bind_all(sqlx::query(sql), params)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn fetch_all(
        &mut self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> MigrationResult<Vec<Box<dyn DatabaseRow>>> {
        let tx = self.inner()?;
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&mut **tx)
            .await?;
        Ok(box_rows(rows))
    }

    async fn execute_script(&mut self, script: &str) -> MigrationResult<()> {
        let tx = self.inner()?;
        // Without bind arguments sqlx uses the simple query protocol, which
        // accepts several statements in one round trip.
        (&mut **tx).execute(script).await?;
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> MigrationResult<()> {
        let tx = self.tx.take().ok_or(MigrationError::TransactionCompleted)?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> MigrationResult<()> {
        let tx = self.tx.take().ok_or(MigrationError::TransactionCompleted)?;
        tx.rollback().await?;
        Ok(())
    }
}

/// PostgreSQL row implementation
pub struct PostgresRow {
    row: PgRow,
}

impl PostgresRow {
    pub fn new(row: PgRow) -> Self {
        Self { row }
    }
}

impl DatabaseRow for PostgresRow {
    fn get_by_name(&self, name: &str) -> MigrationResult<DatabaseValue> {
        let index = self
            .row
            .columns()
            .iter()
            .position(|col| col.name() == name)
            .ok_or_else(|| MigrationError::ColumnNotFound(name.to_string()))?;

        postgres_value_to_database_value(&self.row, index)
    }
}

/// Accept only `postgres://` and `postgresql://` URLs
pub fn validate_database_url(url: &str) -> MigrationResult<()> {
    let parsed = url::Url::parse(url).map_err(|e| MigrationError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "postgres" | "postgresql" => Ok(()),
        other => Err(MigrationError::InvalidUrl(format!(
            "unsupported scheme '{}', expected postgres:// or postgresql://",
            other
        ))),
    }
}

fn box_rows(rows: Vec<PgRow>) -> Vec<Box<dyn DatabaseRow>> {
    rows.into_iter()
        .map(|row| Box::new(PostgresRow::new(row)) as Box<dyn DatabaseRow>)
        .collect()
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[DatabaseValue],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = bind_database_value(query, param);
    }
    query
}

/// Bind a DatabaseValue to a sqlx query
fn bind_database_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &DatabaseValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        DatabaseValue::Null => query.bind(Option::<String>::None),
        DatabaseValue::Bool(b) => query.bind(*b),
        DatabaseValue::Int32(i) => query.bind(*i),
        DatabaseValue::Int64(i) => query.bind(*i),
        DatabaseValue::Float64(f) => query.bind(*f),
        DatabaseValue::String(s) => query.bind(s.clone()),
        DatabaseValue::Bytes(b) => query.bind(b.clone()),
        DatabaseValue::Uuid(u) => query.bind(*u),
        DatabaseValue::DateTime(dt) => query.bind(*dt),
        DatabaseValue::Json(j) => query.bind(j.clone()),
    }
}

fn decode_error(row: &PgRow, index: usize, err: sqlx::Error) -> MigrationError {
    MigrationError::Decode {
        column: row.columns()[index].name().to_string(),
        message: err.to_string(),
    }
}

/// Convert a PostgreSQL column value to DatabaseValue
fn postgres_value_to_database_value(row: &PgRow, index: usize) -> MigrationResult<DatabaseValue> {
    let raw = row.try_get_raw(index).map_err(|e| decode_error(row, index, e))?;
    if raw.is_null() {
        return Ok(DatabaseValue::Null);
    }

    let type_name = row.columns()[index].type_info().name().to_string();
    let value = match type_name.as_str() {
        "BOOL" => row.try_get::<bool, _>(index).map(DatabaseValue::Bool),
        "INT2" => row
            .try_get::<i16, _>(index)
            .map(|v| DatabaseValue::Int32(v as i32)),
        "INT4" => row.try_get::<i32, _>(index).map(DatabaseValue::Int32),
        "INT8" => row.try_get::<i64, _>(index).map(DatabaseValue::Int64),
        "FLOAT4" => row
            .try_get::<f32, _>(index)
            .map(|v| DatabaseValue::Float64(v as f64)),
        "FLOAT8" => row.try_get::<f64, _>(index).map(DatabaseValue::Float64),
        "BYTEA" => row.try_get::<Vec<u8>, _>(index).map(DatabaseValue::Bytes),
        "UUID" => row.try_get::<uuid::Uuid, _>(index).map(DatabaseValue::Uuid),
        "TIMESTAMPTZ" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(index)
            .map(DatabaseValue::DateTime),
        "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(index)
            .map(|v| DatabaseValue::DateTime(v.and_utc())),
        "JSON" | "JSONB" => row.try_get::<JsonValue, _>(index).map(DatabaseValue::Json),
        _ => row.try_get::<String, _>(index).map(DatabaseValue::String),
    };

    value.map_err(|e| decode_error(row, index, e))
}
