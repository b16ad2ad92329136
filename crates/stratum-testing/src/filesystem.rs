//! Temporary migrations directories

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A migrations directory removed when dropped
pub struct TestDirectory {
    dir: TempDir,
}

impl TestDirectory {
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("stratum-").tempdir()?;
        Ok(Self { dir })
    }

    /// Absolute path of the directory
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `name` with `content` and return its absolute path
    pub fn add_file(&self, name: &str, content: &str) -> io::Result<PathBuf> {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Create an empty subdirectory
    pub fn add_dir(&self, name: &str) -> io::Result<PathBuf> {
        let path = self.dir.path().join(name);
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Absolute path a file in this directory would have
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}
