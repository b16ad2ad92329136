//! Directory scanner
//!
//! Lists the migrations directory, orders entries by filename bytes and keeps
//! the ones with a recognized suffix. Nothing is cached between scans.

use std::path::{Component, Path, PathBuf};

use super::definitions::{MigrationFile, MigrationType};
use crate::error::MigrationResult;

/// Resolve a directory against the current working directory
///
/// `.` and `..` components are collapsed lexically; symlinks are not followed.
pub fn resolve_directory(directory: &Path) -> MigrationResult<PathBuf> {
    let absolute = std::path::absolute(directory)?;

    let mut resolved = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other),
        }
    }
    Ok(resolved)
}

/// Scan `directory` for migration files, in application order
///
/// Only the directory itself is listed; subdirectories are not descended
/// into. Unrecognized entries are skipped silently. Listing errors, including
/// a missing directory, are returned unchanged.
pub async fn scan_directory(directory: &Path) -> MigrationResult<Vec<MigrationFile>> {
    let root = resolve_directory(directory)?;

    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(&root).await?;
    while let Some(entry) = entries.next_entry().await? {
        // Names that are not valid UTF-8 can never carry a recognized suffix
        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }

    // Byte-wise lexicographic order is the only sequencing rule
    names.sort();

    let files: Vec<MigrationFile> = names
        .into_iter()
        .filter_map(|filename| {
            let kind = MigrationType::from_filename(&filename)?;
            Some(MigrationFile {
                path: root.join(&filename),
                filename,
                kind,
            })
        })
        .collect();

    tracing::debug!(
        directory = %root.display(),
        count = files.len(),
        "scanned migrations directory"
    );

    Ok(files)
}
