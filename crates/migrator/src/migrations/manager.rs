//! Migration Manager - creates new migration files

use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::error::MigrationResult;

/// Create an empty SQL migration named `<timestamp>_<name>.sql`
///
/// The UTC timestamp prefix keeps lexicographic order equal to creation
/// order. The directory is created if missing; an existing file is never
/// overwritten.
pub async fn create_migration(directory: &Path, name: &str) -> MigrationResult<PathBuf> {
    tokio::fs::create_dir_all(directory).await?;

    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let filename = format!("{}_{}.sql", timestamp, slugify(name));
    let path = std::path::absolute(directory.join(&filename))?;

    write_new_file(&path, &template(name)).await?;

    tracing::debug!(path = %path.display(), "created migration file");
    Ok(path)
}

async fn write_new_file(path: &Path, content: &str) -> MigrationResult<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

fn slugify(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

fn template(name: &str) -> String {
    format!(
        "-- Migration: {}\n-- Created: {}\n\n",
        name.trim(),
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::definitions::MigrationType;
    use tempfile::TempDir;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Create Users"), "create_users");
        assert_eq!(slugify(" add-index "), "add_index");
    }

    #[tokio::test]
    async fn test_create_migration() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("migrations");

        let path = create_migration(&target, "Create users").await.unwrap();
        let filename = path.file_name().unwrap().to_str().unwrap();

        assert!(path.is_absolute());
        assert!(filename.ends_with("_create_users.sql"));
        assert_eq!(filename.len(), "YYYYmmddHHMMSS_create_users.sql".len());
        assert_eq!(MigrationType::from_filename(filename), Some(MigrationType::Sql));

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("-- Migration: Create users\n"));
    }

    #[tokio::test]
    async fn test_existing_file_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("001.sql");

        write_new_file(&path, "select 1;").await.unwrap();
        let second = write_new_file(&path, "drop table users;").await;

        match second {
            Err(crate::error::MigrationError::Io(err)) => {
                assert_eq!(err.kind(), std::io::ErrorKind::AlreadyExists)
            }
            other => panic!("Expected AlreadyExists, got {:?}", other),
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "select 1;");
    }
}
