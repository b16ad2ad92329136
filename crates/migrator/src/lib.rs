//! # stratum-migrator
//!
//! A small schema migration runner. Point a [`Migrator`] at a database
//! handle and a directory of migration files; `apply` runs every file that
//! is not yet recorded in the bookkeeping table, in filename order, each in
//! its own transaction.
//!
//! ```no_run
//! use std::sync::Arc;
//! use stratum_migrator::{Migrator, PostgresPool, TracingLogger};
//!
//! # async fn run() -> stratum_migrator::MigrationResult<()> {
//! let pool = PostgresPool::connect("postgres://localhost/app").await?;
//! let migrator = Migrator::new(Arc::new(pool))
//!     .directory("db/migrations")
//!     .logger(Arc::new(TracingLogger));
//!
//! for path in migrator.apply().await? {
//!     println!("applied {}", path.display());
//! }
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod config;
pub mod error;
pub mod logging;
pub mod migrations;

pub use backends::{
    DatabasePool, DatabaseRow, DatabaseRowExt, DatabaseTransaction, DatabaseValue, PostgresPool,
    PostgresTransaction,
};
pub use config::{ConfigError, ConfigFile, MigratorConfig};
pub use error::{MigrationError, MigrationResult};
pub use logging::{LogContext, Logger, NoopLogger, TracingLogger};
pub use migrations::{
    create_migration, EmbeddedScripts, FnMigration, LoaderRegistry, MigrationBody, MigrationFile,
    MigrationLoader, MigrationRecord, MigrationStatus, MigrationType, Migrator, SqlFileLoader,
    SqlScript,
};
