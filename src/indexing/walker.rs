//! Source-file discovery under an index root.
//!
//! Deterministic walk (sorted by file name) yielding `.py` files, pruning
//! the fixed excluded-directory set before descent.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::parsing::paths::is_excluded_component;

/// All Python files under `root`, in a stable order. Unreadable entries
/// are skipped silently.
pub fn python_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !(entry.file_type().is_dir()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(is_excluded_component))
        })
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "py"))
        .collect()
}

/// Root-relative path with forward slashes, suitable as an index key.
pub fn relative_key(path: &Path, root: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect::<Vec<_>>()
        .join("/")
}
