pub mod apply;
pub mod new;
pub mod status;

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use stratum_migrator::{ConfigFile, Migrator, MigratorConfig, PostgresPool, TracingLogger};

use crate::GlobalArgs;

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "stratum.yaml";

/// Settings after layering defaults, config file, environment and flags
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: MigratorConfig,
    pub database_url: Option<String>,
}

impl Settings {
    pub fn resolve(args: &GlobalArgs) -> anyhow::Result<Self> {
        let file = match &args.config {
            Some(path) => Some(ConfigFile::load(path)?),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Some(ConfigFile::load(Path::new(DEFAULT_CONFIG_FILE))?)
            }
            None => None,
        };

        let mut config = MigratorConfig::default();
        if let Some(file) = &file {
            config.merge_file(file);
        }
        config.merge_env();
        if let Some(table) = &args.table {
            config.table = table.clone();
        }
        if let Some(directory) = &args.directory {
            config.directory = directory.clone();
        }
        config.validate()?;

        let database_url = args
            .database_url
            .clone()
            .or_else(|| file.and_then(|file| file.database_url));

        Ok(Self {
            config,
            database_url,
        })
    }

    pub fn directory(&self) -> &PathBuf {
        &self.config.directory
    }

    /// Connect to the database and build a migrator for these settings
    pub async fn migrator(&self) -> anyhow::Result<Migrator> {
        let url = self
            .database_url
            .as_deref()
            .context("no database URL: pass --database-url, set DATABASE_URL or add database_url to the config file")?;

        let pool = PostgresPool::connect(url).await?;
        tracing::debug!(table = %self.config.table, "connected to database");

        Ok(Migrator::with_config(Arc::new(pool), self.config.clone())
            .logger(Arc::new(TracingLogger)))
    }
}
