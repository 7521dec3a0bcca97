//! Architectural Enforcement Integration Tests
//!
//! Source scans that keep the workspace honest:
//! - No sleep() calls in production code (periodic work uses `interval`)
//!
//! The helpers here locate the workspace and its production sources so the
//! scans run the same from `cargo test` at any directory.

use std::path::{Path, PathBuf};

/// Production source trees that the scans cover, relative to the workspace
pub const PRODUCTION_DIRS: &[&str] = &["display/core/src", "display/daemon/src"];

/// Workspace root (two levels above this crate)
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

/// Every `.rs` file below `dir`, sorted for stable reports
#[must_use]
pub fn rust_sources(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(walkdir::DirEntry::into_path)
        .collect();
    files.sort();
    files
}
