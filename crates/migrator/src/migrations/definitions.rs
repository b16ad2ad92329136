//! Migration Definitions - Core types shared by the migration modules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Recognized migration file type
///
/// `Js`, `Cjs` and `Mjs` are aliases of one another: all three are script
/// migrations run through the registered script loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationType {
    /// Raw SQL script
    Sql,
    Js,
    Cjs,
    Mjs,
}

impl MigrationType {
    /// Recognized types, in the order suffixes are tested
    pub const ALL: [MigrationType; 4] = [
        MigrationType::Sql,
        MigrationType::Js,
        MigrationType::Cjs,
        MigrationType::Mjs,
    ];

    /// Script types sharing one loading strategy
    pub const SCRIPTS: [MigrationType; 3] =
        [MigrationType::Js, MigrationType::Cjs, MigrationType::Mjs];

    /// File extension without the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            MigrationType::Sql => "sql",
            MigrationType::Js => "js",
            MigrationType::Cjs => "cjs",
            MigrationType::Mjs => "mjs",
        }
    }

    pub fn is_script(&self) -> bool {
        !matches!(self, MigrationType::Sql)
    }

    /// Detect the type from a filename suffix; `None` means "not a migration"
    pub fn from_filename(filename: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| {
            filename
                .strip_suffix(kind.extension())
                .is_some_and(|stem| stem.ends_with('.'))
        })
    }
}

impl fmt::Display for MigrationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A recognized file found in the migrations directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// Absolute path of the file
    pub path: PathBuf,
    /// Base name, used as the bookkeeping key
    pub filename: String,
    pub kind: MigrationType,
}

/// A row of the bookkeeping table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Identity assigned by the database, defines application order
    pub id: i64,
    pub filename: String,
    pub created_at: DateTime<Utc>,
}

/// Status of a recognized migration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStatus {
    /// Migration is pending (not yet applied)
    Pending,
    /// Migration has been applied
    Applied {
        /// When it was applied
        applied_at: DateTime<Utc>,
    },
}

impl MigrationStatus {
    pub fn is_applied(&self) -> bool {
        matches!(self, MigrationStatus::Applied { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_detection() {
        assert_eq!(MigrationType::from_filename("001_init.sql"), Some(MigrationType::Sql));
        assert_eq!(MigrationType::from_filename("002.js"), Some(MigrationType::Js));
        assert_eq!(MigrationType::from_filename("003.cjs"), Some(MigrationType::Cjs));
        assert_eq!(MigrationType::from_filename("004.mjs"), Some(MigrationType::Mjs));
        assert_eq!(MigrationType::from_filename(".sql"), Some(MigrationType::Sql));
    }

    #[test]
    fn test_unrecognized_files() {
        for name in ["README.md", "001.sql.bak", "notes.txt", "sql", "001sql", "001.SQL", "002.ts"] {
            assert_eq!(MigrationType::from_filename(name), None, "{}", name);
        }
    }

    #[test]
    fn test_script_aliases() {
        assert!(!MigrationType::Sql.is_script());
        for kind in MigrationType::SCRIPTS {
            assert!(kind.is_script());
        }
        assert_eq!(MigrationType::Cjs.to_string(), "cjs");
    }

    #[test]
    fn test_status() {
        assert!(!MigrationStatus::Pending.is_applied());
        assert!(MigrationStatus::Applied { applied_at: Utc::now() }.is_applied());
    }
}
