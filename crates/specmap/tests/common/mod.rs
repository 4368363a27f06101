//! Common test utilities.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// Get the path to the test fixtures directory.
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Copy one fixture file into `root`, creating parent directories.
fn copy_fixture(root: &Path, relative: &str) {
    let target = root.join(relative);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create fixture dir");
    }
    std::fs::copy(fixtures_dir().join(relative), &target)
        .unwrap_or_else(|e| panic!("Failed to copy {relative}: {e}"));
}

/// Create a temporary project holding the fixture config, snapshots, and specs.
///
/// `specs/libbar.txt` is left out, so libbar has no specification text.
pub fn create_temp_project() -> tempfile::TempDir {
    let temp = tempfile::tempdir().expect("Failed to create temp dir");

    for relative in [
        "config.yaml",
        "snapshots/libfoo.json",
        "snapshots/libbar.json",
        "specs/libfoo.txt",
    ] {
        copy_fixture(temp.path(), relative);
    }

    temp
}
