//! Migration loaders
//!
//! A loader turns a migration file into a `MigrationBody`, the unit of work
//! run inside the migration's transaction. SQL files are handled by
//! `SqlFileLoader`. Script files have no built-in loader: the host registers
//! one, for example an `EmbeddedScripts` table of Rust functions.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;

use super::definitions::{MigrationFile, MigrationType};
use crate::backends::DatabaseTransaction;
use crate::error::{MigrationError, MigrationResult};

/// Executable content of one migration
#[async_trait]
pub trait MigrationBody: Send + Sync {
    /// Run the migration against the transaction it was given
    async fn run(&self, tx: &mut dyn DatabaseTransaction) -> MigrationResult<()>;
}

/// Produces a migration body from a file on disk
#[async_trait]
pub trait MigrationLoader: Send + Sync {
    async fn load(&self, file: &MigrationFile) -> MigrationResult<Arc<dyn MigrationBody>>;
}

/// Raw SQL executed as a single script
#[derive(Debug, Clone)]
pub struct SqlScript {
    sql: String,
}

impl SqlScript {
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

#[async_trait]
impl MigrationBody for SqlScript {
    async fn run(&self, tx: &mut dyn DatabaseTransaction) -> MigrationResult<()> {
        tx.execute_script(&self.sql).await
    }
}

/// Reads `.sql` files into `SqlScript` bodies
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlFileLoader;

#[async_trait]
impl MigrationLoader for SqlFileLoader {
    async fn load(&self, file: &MigrationFile) -> MigrationResult<Arc<dyn MigrationBody>> {
        let sql = tokio::fs::read_to_string(&file.path).await?;
        Ok(Arc::new(SqlScript::new(sql)))
    }
}

/// Migration body backed by a closure
///
/// ```no_run
/// use stratum_migrator::FnMigration;
///
/// let body = FnMigration::new(|tx| {
///     Box::pin(async move {
///         tx.execute("insert into settings (key) values ($1)", &["theme".into()])
///             .await
///             .map(|_| ())
///     })
/// });
/// ```
pub struct FnMigration<F> {
    f: F,
}

impl<F> FnMigration<F>
where
    F: for<'a> Fn(&'a mut dyn DatabaseTransaction) -> BoxFuture<'a, MigrationResult<()>>
        + Send
        + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> MigrationBody for FnMigration<F>
where
    F: for<'a> Fn(&'a mut dyn DatabaseTransaction) -> BoxFuture<'a, MigrationResult<()>>
        + Send
        + Sync,
{
    async fn run(&self, tx: &mut dyn DatabaseTransaction) -> MigrationResult<()> {
        (self.f)(tx).await
    }
}

/// Script loader resolving files to bodies registered by filename
///
/// The file on disk only marks the migration's position in the sequence;
/// its body is compiled into the host program.
#[derive(Default, Clone)]
pub struct EmbeddedScripts {
    bodies: HashMap<String, Arc<dyn MigrationBody>>,
}

impl EmbeddedScripts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the body for a script file such as `002_seed.js`
    pub fn register(mut self, filename: impl Into<String>, body: impl MigrationBody + 'static) -> Self {
        self.bodies.insert(filename.into(), Arc::new(body));
        self
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

#[async_trait]
impl MigrationLoader for EmbeddedScripts {
    async fn load(&self, file: &MigrationFile) -> MigrationResult<Arc<dyn MigrationBody>> {
        self.bodies
            .get(&file.filename)
            .cloned()
            .ok_or_else(|| MigrationError::ScriptNotFound(file.filename.clone()))
    }
}

/// Loaders keyed by migration type
#[derive(Clone)]
pub struct LoaderRegistry {
    loaders: HashMap<MigrationType, Arc<dyn MigrationLoader>>,
}

impl LoaderRegistry {
    /// Registry with only the SQL loader installed
    pub fn new() -> Self {
        let mut loaders: HashMap<MigrationType, Arc<dyn MigrationLoader>> = HashMap::new();
        loaders.insert(MigrationType::Sql, Arc::new(SqlFileLoader));
        Self { loaders }
    }

    /// Install a loader for one type, replacing any previous one
    pub fn register(&mut self, kind: MigrationType, loader: Arc<dyn MigrationLoader>) {
        self.loaders.insert(kind, loader);
    }

    /// Install one loader for every script alias
    pub fn register_scripts(&mut self, loader: Arc<dyn MigrationLoader>) {
        for kind in MigrationType::SCRIPTS {
            self.register(kind, Arc::clone(&loader));
        }
    }

    pub fn has_loader(&self, kind: MigrationType) -> bool {
        self.loaders.contains_key(&kind)
    }

    /// Load the body for a scanned file
    pub async fn load(&self, file: &MigrationFile) -> MigrationResult<Arc<dyn MigrationBody>> {
        let loader = self.loaders.get(&file.kind).ok_or_else(|| MigrationError::NoLoader {
            filename: file.filename.clone(),
            extension: file.kind.extension().to_string(),
        })?;
        loader.load(file).await
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
