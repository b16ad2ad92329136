//! Bookkeeping table manager
//!
//! Owns every statement issued against the bookkeeping table. The table name
//! is always quoted by the backend before it is spliced into SQL.

use std::path::Path;

use super::definitions::MigrationRecord;
use crate::backends::{DatabasePool, DatabaseRowExt, DatabaseTransaction, DatabaseValue};
use crate::error::MigrationResult;

/// Statements and queries for one bookkeeping table
pub struct Bookkeeping<'a> {
    pool: &'a dyn DatabasePool,
    table: &'a str,
}

impl<'a> Bookkeeping<'a> {
    pub fn new(pool: &'a dyn DatabasePool, table: &'a str) -> Self {
        Self { pool, table }
    }

    fn quoted(&self) -> String {
        self.pool.quote_identifier(self.table)
    }

    /// Create the table if it does not exist yet
    pub async fn ensure_initialized(&self) -> MigrationResult<()> {
        let sql = format!(
            "create table if not exists {} (\n    \
                id integer primary key generated always as identity,\n    \
                filename text not null,\n    \
                created_at timestamp not null default now()\n\
            )",
            self.quoted()
        );
        self.pool.execute(&sql, &[]).await?;
        Ok(())
    }

    /// Whether the table exists, according to the schema catalog
    pub async fn is_initialized(&self) -> MigrationResult<bool> {
        let rows = self
            .pool
            .fetch_all(
                "select 1 from information_schema.tables where table_name = $1",
                &[DatabaseValue::from(self.table)],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    /// Whether a record exists for the base name of `filename`
    pub async fn has(&self, filename: &str) -> MigrationResult<bool> {
        let sql = format!("select 1 from {} where filename = $1", self.quoted());
        let rows = self
            .pool
            .fetch_all(&sql, &[DatabaseValue::from(base_name(filename))])
            .await?;
        Ok(!rows.is_empty())
    }

    /// Recorded filenames in application order
    pub async fn filenames(&self) -> MigrationResult<Vec<String>> {
        let sql = format!("select filename from {} order by id", self.quoted());
        let rows = self.pool.fetch_all(&sql, &[]).await?;
        rows.iter().map(|row| row.get::<String>("filename")).collect()
    }

    /// Full records in application order
    pub async fn records(&self) -> MigrationResult<Vec<MigrationRecord>> {
        let sql = format!(
            "select id, filename, created_at from {} order by id",
            self.quoted()
        );
        let rows = self.pool.fetch_all(&sql, &[]).await?;
        rows.iter()
            .map(|row| -> MigrationResult<MigrationRecord> {
                Ok(MigrationRecord {
                    id: row.get("id")?,
                    filename: row.get("filename")?,
                    created_at: row.get("created_at")?,
                })
            })
            .collect()
    }

    /// Insert a record inside the migration's own transaction
    pub async fn record(
        &self,
        tx: &mut dyn DatabaseTransaction,
        filename: &str,
    ) -> MigrationResult<()> {
        let sql = format!(
            "insert into {} (filename) values ($1)",
            tx.quote_identifier(self.table)
        );
        tx.execute(&sql, &[DatabaseValue::from(filename)]).await?;
        Ok(())
    }
}

/// Strip any directory components from a filename
pub fn base_name(filename: &str) -> &str {
    Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("001.sql"), "001.sql");
        assert_eq!(base_name("/srv/app/migrations/001.sql"), "001.sql");
        assert_eq!(base_name("migrations/002_users.js"), "002_users.js");
    }
}
