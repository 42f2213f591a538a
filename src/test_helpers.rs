//! Test utilities for creating temporary stream directories.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A temporary directory standing in for an application's stream directory.
pub struct TempLogDir {
    _temp_dir: tempfile::TempDir,
    path: PathBuf,
}

impl TempLogDir {
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().to_path_buf();
        Ok(Self {
            _temp_dir: temp_dir,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of a stream file in the directory, without creating it.
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Create (or replace) a stream file with `content`
    pub fn write(&self, name: &str, content: &str) -> std::io::Result<PathBuf> {
        let path = self.file(name);
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Append raw content, creating the file if needed
    pub fn append(&self, name: &str, content: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file(name))?;
        file.write_all(content.as_bytes())?;
        file.flush()
    }

    /// Delete a stream file (simulate rotation)
    pub fn remove(&self, name: &str) -> std::io::Result<()> {
        fs::remove_file(self.file(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_log_dir_creation() {
        let dir = TempLogDir::new().unwrap();
        assert!(dir.path().is_dir());
        assert!(!dir.file("net").exists());
    }

    #[test]
    fn test_write_and_append() {
        let dir = TempLogDir::new().unwrap();
        let path = dir.write("net", "\none").unwrap();
        dir.append("net", "\ntwo").unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap(), "\none\ntwo");
    }

    #[test]
    fn test_remove() {
        let dir = TempLogDir::new().unwrap();
        dir.write("net", "x").unwrap();
        dir.remove("net").unwrap();

        assert!(!dir.file("net").exists());
    }
}
