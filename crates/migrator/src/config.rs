//! Migrator configuration
//!
//! Every setting is optional. Values are layered: built-in defaults, then a
//! YAML config file, then environment variables, then whatever the caller sets
//! programmatically.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default bookkeeping table name
pub const DEFAULT_TABLE: &str = "migrations";

/// Default migrations directory
pub const DEFAULT_DIRECTORY: &str = "./migrations";

/// Environment variable overriding the bookkeeping table name
pub const TABLE_ENV: &str = "STRATUM_MIGRATIONS_TABLE";

/// Environment variable overriding the migrations directory
pub const DIRECTORY_ENV: &str = "STRATUM_MIGRATIONS_DIR";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: '{value}', expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Settings the migrator needs to locate migrations and record them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigratorConfig {
    /// Bookkeeping table name
    pub table: String,
    /// Directory holding the migration files
    pub directory: PathBuf,
}

impl MigratorConfig {
    pub fn new(table: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            table: table.into(),
            directory: directory.into(),
        }
    }

    /// Defaults overridden by `STRATUM_MIGRATIONS_TABLE` / `STRATUM_MIGRATIONS_DIR`
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.merge_env();
        config.validate()?;
        Ok(config)
    }

    /// Override fields with any environment variables that are set
    pub fn merge_env(&mut self) {
        if let Ok(table) = env::var(TABLE_ENV) {
            self.table = table;
        }
        if let Ok(directory) = env::var(DIRECTORY_ENV) {
            self.directory = PathBuf::from(directory);
        }
    }

    /// Override fields with the values present in a config file
    pub fn merge_file(&mut self, file: &ConfigFile) {
        if let Some(table) = &file.table {
            self.table = table.clone();
        }
        if let Some(directory) = &file.directory {
            self.directory = directory.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table.trim().is_empty() || self.table.contains('\0') {
            return Err(ConfigError::InvalidValue {
                field: "table".to_string(),
                value: self.table.clone(),
                expected: "a non-empty table name without NUL characters".to_string(),
            });
        }
        if self.directory.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "directory".to_string(),
                value: String::new(),
                expected: "a directory path".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE, DEFAULT_DIRECTORY)
    }
}

/// On-disk configuration file (`stratum.yaml`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub table: Option<String>,
    pub directory: Option<PathBuf>,
    pub database_url: Option<String>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        // An empty file deserializes to YAML null
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
