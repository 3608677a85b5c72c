//! Shared test fixtures.
//!
//! Folder scans skip hidden directories, and temp directories often live
//! under dot-prefixed paths, so fixtures always work inside a visible
//! `wiki` subdirectory.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use crate::folder::Folder;

/// A fresh directory suitable for building a test folder in.
pub fn create_test_folder_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create temp directory");
    let folder_dir = temp_dir.path().join("wiki");
    fs::create_dir(&folder_dir).expect("failed to create wiki subdirectory");
    (temp_dir, folder_dir)
}

/// Builds a folder after letting `setup_fn` populate the directory.
pub fn create_test_folder<F>(setup_fn: F) -> (TempDir, PathBuf, Folder)
where
    F: FnOnce(&PathBuf),
{
    let (temp_dir, folder_dir) = create_test_folder_dir();
    setup_fn(&folder_dir);
    let folder = Folder::try_load("wiki", &folder_dir).expect("failed to load test folder");
    (temp_dir, folder_dir, folder)
}
