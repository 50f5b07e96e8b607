//! Common test utilities for integration tests
//!
//! Shared fixtures used across the integration test binaries. These utilities
//! are not compiled into the library.

#![allow(dead_code)]

use anyhow::Result;
use qmd_lint::{LinterConfig, QmdLintConfig};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Isolated test fixture with automatic cleanup
///
/// Creates a temporary copy of a fixture directory so tests can run in
/// parallel and write converted files without touching the repository.
pub struct TestFixture {
    _dir: TempDir,
    root: PathBuf,
}

impl TestFixture {
    /// Create a new test fixture from the default docs directory
    pub fn new() -> Result<Self> {
        Self::new_from("tests/fixtures/docs")
    }

    /// Create a new test fixture from a specific source directory
    pub fn new_from(source: impl AsRef<Path>) -> Result<Self> {
        let dir = TempDir::new()?;
        copy_dir_all(source.as_ref(), dir.path())?;

        Ok(Self {
            root: dir.path().to_path_buf(),
            _dir: dir,
        })
    }

    /// Get the path to the fixture root
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Write a document into the fixture and return its path
    pub fn write(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }
}

/// Configuration running `command` with `flags` instead of pylint
pub fn config_with_linter(command: &str, flags: &[&str]) -> QmdLintConfig {
    QmdLintConfig {
        linter: LinterConfig {
            command: command.to_string(),
            flags: flags.iter().map(|f| f.to_string()).collect(),
        },
        ..QmdLintConfig::default()
    }
}

/// Recursively copy all files and directories from src to dst
fn copy_dir_all(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<()> {
    std::fs::create_dir_all(&dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let ty = entry.file_type()?;
        if ty.is_dir() {
            copy_dir_all(entry.path(), dst.as_ref().join(entry.file_name()))?;
        } else {
            std::fs::copy(entry.path(), dst.as_ref().join(entry.file_name()))?;
        }
    }
    Ok(())
}
