// tests/common/mod.rs
//
// Shared test helpers. Imported via `mod common;` in integration test files.

use std::fs;
use std::path::{Path, PathBuf};

/// A temp directory that persists on test failure (for debugging) but
/// cleans up on success. Call `.pass()` at the end of a passing test.
///
/// Dirs use a recognizable prefix (`luatest-explorer-test-`) so stale
/// ones from failed runs can be identified and cleaned manually:
///   rm -rf /tmp/luatest-explorer-test-*
pub struct TestDir {
    path: PathBuf,
}

impl TestDir {
    pub fn new() -> Self {
        let dir = tempfile::Builder::new()
            .prefix("luatest-explorer-test-")
            .tempdir()
            .unwrap();
        let path = dir.keep();
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a file under the temp dir, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// Clean up the temp dir. Call at the very end of a test; if an
    /// assertion panics before this line, the directory is preserved.
    pub fn pass(self) {
        fs::remove_dir_all(&self.path).ok();
    }
}
