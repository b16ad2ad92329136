//! Migration Runner - applies pending migrations and answers state queries
//!
//! Every call re-reads both the migrations directory and the bookkeeping
//! table; nothing is cached on the `Migrator`.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::bookkeeping::Bookkeeping;
use super::definitions::{MigrationFile, MigrationRecord, MigrationStatus, MigrationType};
use super::loader::{LoaderRegistry, MigrationLoader};
use super::scanner::{resolve_directory, scan_directory};
use crate::backends::DatabasePool;
use crate::config::MigratorConfig;
use crate::error::MigrationResult;
use crate::logging::{Logger, NoopLogger};

/// Applies migration files from one directory to one database
///
/// Runs are sequential and hold no lock: two processes applying the same
/// directory at once can both see a file as pending. Callers needing
/// cross-instance safety should wrap `apply` in their own advisory lock.
pub struct Migrator {
    pool: Arc<dyn DatabasePool>,
    config: MigratorConfig,
    logger: Arc<dyn Logger>,
    loaders: LoaderRegistry,
}

impl Migrator {
    /// Create a migrator with the default table and directory
    pub fn new(pool: Arc<dyn DatabasePool>) -> Self {
        Self::with_config(pool, MigratorConfig::default())
    }

    /// Create a migrator with a custom configuration
    pub fn with_config(pool: Arc<dyn DatabasePool>, config: MigratorConfig) -> Self {
        Self {
            pool,
            config,
            logger: Arc::new(NoopLogger),
            loaders: LoaderRegistry::new(),
        }
    }

    /// Set the bookkeeping table name
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.config.table = table.into();
        self
    }

    /// Set the migrations directory
    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.config.directory = directory.into();
        self
    }

    /// Set the logger receiving one `info` call per applied migration
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Register the loader used for every script migration alias
    pub fn script_loader(mut self, loader: Arc<dyn MigrationLoader>) -> Self {
        self.loaders.register_scripts(loader);
        self
    }

    /// Register a loader for a single migration type
    pub fn loader(mut self, kind: MigrationType, loader: Arc<dyn MigrationLoader>) -> Self {
        self.loaders.register(kind, loader);
        self
    }

    fn bookkeeping(&self) -> Bookkeeping<'_> {
        Bookkeeping::new(self.pool.as_ref(), &self.config.table)
    }

    /// Apply every pending migration in filename order
    ///
    /// Returns the absolute paths of the migrations applied by this call.
    /// The first failure stops the run and is returned unchanged; migrations
    /// committed before it stay applied.
    pub async fn apply(&self) -> MigrationResult<Vec<PathBuf>> {
        let bookkeeping = self.bookkeeping();
        bookkeeping.ensure_initialized().await?;

        let files = scan_directory(&self.config.directory).await?;
        let mut applied = Vec::new();

        for file in &files {
            if bookkeeping.has(&file.filename).await? {
                tracing::debug!(filename = %file.filename, "migration already applied, skipping");
                continue;
            }

            self.logger
                .info(&[("filename", file.filename.as_str())], "applying migration");

            applied.push(self.apply_file(&bookkeeping, file).await?);
        }

        tracing::debug!(
            applied = applied.len(),
            scanned = files.len(),
            "migration run complete"
        );

        Ok(applied)
    }

    /// Same as [`Migrator::apply`]
    pub async fn migrate(&self) -> MigrationResult<Vec<PathBuf>> {
        self.apply().await
    }

    /// Whether `filename` (directory components ignored) has been applied
    ///
    /// Returns `false` on a database this migrator has never touched.
    pub async fn has(&self, filename: &str) -> MigrationResult<bool> {
        let bookkeeping = self.bookkeeping();
        if !bookkeeping.is_initialized().await? {
            return Ok(false);
        }
        bookkeeping.has(filename).await
    }

    /// Absolute paths of applied migrations, in application order
    pub async fn all(&self) -> MigrationResult<Vec<PathBuf>> {
        let bookkeeping = self.bookkeeping();
        if !bookkeeping.is_initialized().await? {
            return Ok(Vec::new());
        }

        let root = resolve_directory(&self.config.directory)?;
        let filenames = bookkeeping.filenames().await?;
        Ok(filenames.into_iter().map(|name| root.join(name)).collect())
    }

    /// Same as [`Migrator::all`]
    pub async fn migrated(&self) -> MigrationResult<Vec<PathBuf>> {
        self.all().await
    }

    /// Bookkeeping rows in application order
    pub async fn records(&self) -> MigrationResult<Vec<MigrationRecord>> {
        let bookkeeping = self.bookkeeping();
        if !bookkeeping.is_initialized().await? {
            return Ok(Vec::new());
        }
        bookkeeping.records().await
    }

    /// Every recognized file in the directory with its status
    pub async fn status(&self) -> MigrationResult<Vec<(MigrationFile, MigrationStatus)>> {
        let files = scan_directory(&self.config.directory).await?;
        let applied: HashMap<String, MigrationRecord> = self
            .records()
            .await?
            .into_iter()
            .map(|record| (record.filename.clone(), record))
            .collect();

        Ok(files
            .into_iter()
            .map(|file| {
                let status = match applied.get(&file.filename) {
                    Some(record) => MigrationStatus::Applied {
                        applied_at: record.created_at,
                    },
                    None => MigrationStatus::Pending,
                };
                (file, status)
            })
            .collect())
    }

    /// Recognized files not yet recorded, in application order
    pub async fn pending(&self) -> MigrationResult<Vec<MigrationFile>> {
        Ok(self
            .status()
            .await?
            .into_iter()
            .filter(|(_, status)| !status.is_applied())
            .map(|(file, _)| file)
            .collect())
    }

    /// Run one migration and its bookkeeping insert in a single transaction
    async fn apply_file(
        &self,
        bookkeeping: &Bookkeeping<'_>,
        file: &MigrationFile,
    ) -> MigrationResult<PathBuf> {
        let body = self.loaders.load(file).await?;

        let mut tx = self.pool.begin().await?;
        let outcome = async {
            body.run(tx.as_mut()).await?;
            bookkeeping.record(tx.as_mut(), &file.filename).await
        }
        .await;

        match outcome {
            Ok(()) => {
                tx.commit().await?;
                tracing::debug!(filename = %file.filename, "migration committed");
                Ok(file.path.clone())
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(
                        filename = %file.filename,
                        error = %rollback_err,
                        "rollback after failed migration also failed"
                    );
                }
                Err(err)
            }
        }
    }
}

impl fmt::Debug for Migrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migrator")
            .field("table", &self.config.table)
            .field("directory", &self.config.directory)
            .finish_non_exhaustive()
    }
}
