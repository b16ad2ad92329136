//! In-memory database backend
//!
//! `MockDatabase` implements the migrator's backend traits without a server.
//! It understands the statements the migrator issues against its bookkeeping
//! table and treats everything else as a successful no-op, except for
//! statements matching a failure rule registered with [`MockDatabase::fail_on`].
//!
//! Transactions work on a copy of the state that replaces the shared state on
//! commit and is discarded on rollback. The statement log is shared and keeps
//! statements from rolled back transactions too.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use stratum_migrator::{
    DatabasePool, DatabaseRow, DatabaseTransaction, DatabaseValue, MigrationError,
    MigrationResult,
};

#[derive(Debug, Clone)]
struct StoredRecord {
    id: i64,
    filename: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct State {
    tables: BTreeSet<String>,
    records: BTreeMap<String, Vec<StoredRecord>>,
    next_id: i64,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    statements: Mutex<Vec<String>>,
    failures: Mutex<Vec<(String, String)>>,
    rollback_failure: Mutex<Option<String>>,
    commits: Mutex<usize>,
    rollbacks: Mutex<usize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory stand-in for a PostgreSQL pool
#[derive(Debug, Clone, Default)]
pub struct MockDatabase {
    shared: Arc<Shared>,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any statement containing `pattern` with `message`
    pub fn fail_on(&self, pattern: impl Into<String>, message: impl Into<String>) -> &Self {
        lock(&self.shared.failures).push((pattern.into().to_lowercase(), message.into()));
        self
    }

    /// Make every later rollback report `message` after discarding its changes
    pub fn fail_rollback(&self, message: impl Into<String>) -> &Self {
        *lock(&self.shared.rollback_failure) = Some(message.into());
        self
    }

    /// Create a table, as if done by an earlier run
    pub fn create_table(&self, table: &str) -> &Self {
        let mut state = lock(&self.shared.state);
        state.tables.insert(table.to_string());
        state.records.entry(table.to_string()).or_default();
        self
    }

    /// Insert bookkeeping records, creating the table if needed
    pub fn seed(&self, table: &str, filenames: &[&str]) -> &Self {
        self.create_table(table);
        let mut state = lock(&self.shared.state);
        for filename in filenames {
            insert_record(&mut state, table, filename);
        }
        self
    }

    pub fn has_table(&self, table: &str) -> bool {
        lock(&self.shared.state).tables.contains(table)
    }

    /// Recorded filenames of a bookkeeping table, in insertion order
    pub fn recorded(&self, table: &str) -> Vec<String> {
        lock(&self.shared.state)
            .records
            .get(table)
            .map(|records| records.iter().map(|r| r.filename.clone()).collect())
            .unwrap_or_default()
    }

    /// Every statement received so far, in order
    pub fn statements(&self) -> Vec<String> {
        lock(&self.shared.statements).clone()
    }

    /// Whether any received statement contains `pattern`, case-insensitively
    pub fn executed(&self, pattern: &str) -> bool {
        let pattern = pattern.to_lowercase();
        lock(&self.shared.statements)
            .iter()
            .any(|sql| sql.to_lowercase().contains(&pattern))
    }

    pub fn commits(&self) -> usize {
        *lock(&self.shared.commits)
    }

    pub fn rollbacks(&self) -> usize {
        *lock(&self.shared.rollbacks)
    }

    fn run(
        &self,
        state: &mut State,
        sql: &str,
        params: &[DatabaseValue],
    ) -> MigrationResult<(u64, Vec<Box<dyn DatabaseRow>>)> {
        lock(&self.shared.statements).push(sql.to_string());

        let lowered = sql.trim().to_lowercase();
        if let Some((_, message)) = lock(&self.shared.failures)
            .iter()
            .find(|(pattern, _)| lowered.contains(pattern.as_str()))
        {
            return Err(MigrationError::Query(message.clone()));
        }

        if lowered.starts_with("create table") {
            if let Some(table) = created_table(sql) {
                state.records.entry(table.clone()).or_default();
                state.tables.insert(table);
            }
            return Ok((0, Vec::new()));
        }

        if lowered.contains("information_schema.tables") {
            let exists = string_param(params, 0)
                .map(|table| state.tables.contains(table))
                .unwrap_or(false);
            let rows = if exists {
                vec![MockRow::boxed(vec![("?column?", DatabaseValue::Int32(1))])]
            } else {
                Vec::new()
            };
            return Ok((0, rows));
        }

        if lowered.starts_with("select 1 from") {
            let records = existing_records(state, sql)?;
            let filename = string_param(params, 0).unwrap_or_default();
            let rows = records
                .iter()
                .filter(|r| r.filename == filename)
                .map(|_| MockRow::boxed(vec![("?column?", DatabaseValue::Int32(1))]))
                .collect();
            return Ok((0, rows));
        }

        if lowered.starts_with("select filename from") {
            let rows = existing_records(state, sql)?
                .iter()
                .map(|r| MockRow::boxed(vec![("filename", DatabaseValue::from(r.filename.as_str()))]))
                .collect();
            return Ok((0, rows));
        }

        if lowered.starts_with("select id, filename, created_at from") {
            let rows = existing_records(state, sql)?
                .iter()
                .map(|r| {
                    MockRow::boxed(vec![
                        ("id", DatabaseValue::Int64(r.id)),
                        ("filename", DatabaseValue::from(r.filename.as_str())),
                        ("created_at", DatabaseValue::DateTime(r.created_at)),
                    ])
                })
                .collect();
            return Ok((0, rows));
        }

        if lowered.starts_with("insert into") {
            let table = quoted_identifier(sql)
                .ok_or_else(|| MigrationError::Query("insert without a quoted table".into()))?;
            if !state.tables.contains(&table) {
                return Err(missing_relation(&table));
            }
            let filename = string_param(params, 0)
                .ok_or_else(|| MigrationError::Query("insert without a filename".into()))?
                .to_string();
            insert_record(state, &table, &filename);
            return Ok((1, Vec::new()));
        }

        Ok((0, Vec::new()))
    }

    fn run_shared(
        &self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> MigrationResult<(u64, Vec<Box<dyn DatabaseRow>>)> {
        let mut state = lock(&self.shared.state).clone();
        let outcome = self.run(&mut state, sql, params)?;
        *lock(&self.shared.state) = state;
        Ok(outcome)
    }
}

#[async_trait]
impl DatabasePool for MockDatabase {
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> MigrationResult<u64> {
        Ok(self.run_shared(sql, params)?.0)
    }

    async fn fetch_all(
        &self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> MigrationResult<Vec<Box<dyn DatabaseRow>>> {
        Ok(self.run_shared(sql, params)?.1)
    }

    async fn begin(&self) -> MigrationResult<Box<dyn DatabaseTransaction>> {
        let staged = lock(&self.shared.state).clone();
        Ok(Box::new(MockTransaction {
            db: self.clone(),
            staged,
        }))
    }
}

/// Transaction over a private copy of the mock state
#[derive(Debug)]
pub struct MockTransaction {
    db: MockDatabase,
    staged: State,
}

#[async_trait]
impl DatabaseTransaction for MockTransaction {
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> MigrationResult<u64> {
        Ok(self.db.run(&mut self.staged, sql, params)?.0)
    }

    async fn fetch_all(
        &mut self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> MigrationResult<Vec<Box<dyn DatabaseRow>>> {
        Ok(self.db.run(&mut self.staged, sql, params)?.1)
    }

    async fn execute_script(&mut self, script: &str) -> MigrationResult<()> {
        for statement in script.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            self.db.run(&mut self.staged, statement, &[])?;
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> MigrationResult<()> {
        let MockTransaction { db, staged } = *self;
        *lock(&db.shared.state) = staged;
        *lock(&db.shared.commits) += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> MigrationResult<()> {
        *lock(&self.db.shared.rollbacks) += 1;
        match lock(&self.db.shared.rollback_failure).clone() {
            Some(message) => Err(MigrationError::Query(message)),
            None => Ok(()),
        }
    }
}

/// Result row holding named values
#[derive(Debug, Clone)]
pub struct MockRow {
    columns: Vec<(String, DatabaseValue)>,
}

impl MockRow {
    pub fn new(columns: Vec<(&str, DatabaseValue)>) -> Self {
        Self {
            columns: columns
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        }
    }

    fn boxed(columns: Vec<(&str, DatabaseValue)>) -> Box<dyn DatabaseRow> {
        Box::new(Self::new(columns))
    }
}

impl DatabaseRow for MockRow {
    fn get_by_name(&self, name: &str) -> MigrationResult<DatabaseValue> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| MigrationError::ColumnNotFound(name.to_string()))
    }
}

fn insert_record(state: &mut State, table: &str, filename: &str) {
    state.next_id += 1;
    let record = StoredRecord {
        id: state.next_id,
        filename: filename.to_string(),
        created_at: Utc::now(),
    };
    state.records.entry(table.to_string()).or_default().push(record);
}

fn existing_records<'s>(state: &'s State, sql: &str) -> MigrationResult<&'s [StoredRecord]> {
    let table = quoted_identifier(sql)
        .ok_or_else(|| MigrationError::Query("query without a quoted table".into()))?;
    match state.records.get(&table) {
        Some(records) if state.tables.contains(&table) => Ok(records.as_slice()),
        _ => Err(missing_relation(&table)),
    }
}

fn missing_relation(table: &str) -> MigrationError {
    MigrationError::Query(format!("relation \"{}\" does not exist", table))
}

fn string_param(params: &[DatabaseValue], index: usize) -> Option<&str> {
    params.get(index).and_then(DatabaseValue::as_str)
}

/// First double-quoted identifier in `sql`, unescaped
fn quoted_identifier(sql: &str) -> Option<String> {
    let start = sql.find('"')? + 1;
    let mut name = String::new();
    let mut chars = sql[start..].chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            if chars.peek() == Some(&'"') {
                chars.next();
                name.push('"');
            } else {
                return Some(name);
            }
        } else {
            name.push(c);
        }
    }
    None
}

/// Table named by a `create table [if not exists] <name>` statement
fn created_table(sql: &str) -> Option<String> {
    let trimmed = sql.trim();
    let rest = trimmed.get("create table".len()..)?.trim_start();
    let rest = match rest.get(.."if not exists".len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case("if not exists") => {
            rest["if not exists".len()..].trim_start()
        }
        _ => rest,
    };
    if rest.starts_with('"') {
        return quoted_identifier(rest);
    }
    let name: String = rest
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '(')
        .collect();
    (!name.is_empty()).then(|| name.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_migrator::DatabaseRowExt;

    #[test]
    fn test_quoted_identifier() {
        assert_eq!(quoted_identifier("select 1 from \"migrations\""), Some("migrations".into()));
        assert_eq!(quoted_identifier("insert into \"a\"\"b\" (x)"), Some("a\"b".into()));
        assert_eq!(quoted_identifier("select 1"), None);
    }

    #[test]
    fn test_created_table() {
        assert_eq!(created_table("create table Users (id integer)"), Some("users".into()));
        assert_eq!(
            created_table("CREATE TABLE IF NOT EXISTS \"Log\" (id integer)"),
            Some("Log".into())
        );
        assert_eq!(created_table("create table t(id integer)"), Some("t".into()));
    }

    #[tokio::test]
    async fn test_bookkeeping_statements() {
        let db = MockDatabase::new();
        let table = [DatabaseValue::from("migrations")];

        let exists = "select 1 from information_schema.tables where table_name = $1";
        assert!(db.fetch_all(exists, &table).await.unwrap().is_empty());

        db.execute("create table if not exists \"migrations\" (id integer)", &[])
            .await
            .unwrap();
        assert_eq!(db.fetch_all(exists, &table).await.unwrap().len(), 1);

        let mut tx = db.begin().await.unwrap();
        tx.execute("insert into \"migrations\" (filename) values ($1)", &["001.sql".into()])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let rows = db
            .fetch_all("select filename from \"migrations\" order by id", &[])
            .await
            .unwrap();
        assert_eq!(rows[0].get::<String>("filename").unwrap(), "001.sql");
        assert_eq!(db.recorded("migrations"), ["001.sql"]);
    }

    #[tokio::test]
    async fn test_rollback_discards_changes() {
        let db = MockDatabase::new();
        db.create_table("migrations");

        let mut tx = db.begin().await.unwrap();
        tx.execute_script("create table users (id integer); select 1;")
            .await
            .unwrap();
        tx.execute("insert into \"migrations\" (filename) values ($1)", &["001.sql".into()])
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        assert!(!db.has_table("users"));
        assert!(db.recorded("migrations").is_empty());
        assert!(db.executed("create table users"));
        assert_eq!(db.rollbacks(), 1);
        assert_eq!(db.commits(), 0);
    }

    #[tokio::test]
    async fn test_failing_rollback_still_discards_changes() {
        let db = MockDatabase::new();
        db.fail_rollback("connection reset");

        let mut tx = db.begin().await.unwrap();
        tx.execute_script("create table users (id integer);").await.unwrap();
        let err = tx.rollback().await.unwrap_err();

        assert_eq!(err.to_string(), "connection reset");
        assert!(!db.has_table("users"));
        assert_eq!(db.rollbacks(), 1);
    }

    #[tokio::test]
    async fn test_failure_rules() {
        let db = MockDatabase::new();
        db.fail_on("1/0", "division by zero");

        let mut tx = db.begin().await.unwrap();
        let err = tx.execute_script("select 1; select 1/0;").await.unwrap_err();
        assert_eq!(err.to_string(), "division by zero");
        assert!(err.is_database_error());
    }

    #[tokio::test]
    async fn test_missing_table_is_an_error() {
        let db = MockDatabase::new();
        let result = db
            .fetch_all("select filename from \"migrations\" order by id", &[])
            .await;

        match result {
            Err(err) => assert_eq!(err.to_string(), "relation \"migrations\" does not exist"),
            Ok(_) => panic!("Expected missing relation error"),
        }
    }
}
