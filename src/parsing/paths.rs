//! Path utilities for module-name computation and source-tree filtering.
//!
//! Uses `Path` APIs instead of string manipulation so path separators are
//! handled consistently across operating systems.

use std::path::Path;

/// Directory names that never contribute source files: version-control
/// metadata, byte-code caches, virtual environments, test caches, and
/// build/dist outputs.
pub const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    "__pycache__",
    ".venv",
    "venv",
    ".mypy_cache",
    ".pytest_cache",
    "build",
    "dist",
];

/// True when a path component names an excluded directory.
pub fn is_excluded_component(name: &str) -> bool {
    EXCLUDED_DIRS.contains(&name)
}

/// True for regular `.py` files.
pub fn is_python_file(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == "py")
}

/// Compute the dotted module name of a file from its root-relative path.
///
/// An `__init__.py` contributes its directory's dotted name; any other
/// file appends its stem. A root-level `__init__.py` yields the empty
/// string.
pub fn module_name_from_relpath(rel: &Path) -> String {
    let mut parts: Vec<String> = Vec::new();
    for component in rel.components() {
        if let Some(s) = component.as_os_str().to_str() {
            parts.push(s.to_string());
        }
    }
    if let Some(last) = parts.last_mut() {
        if last == "__init__.py" {
            parts.pop();
        } else if let Some(stem) = last.strip_suffix(".py") {
            *last = stem.to_string();
        }
    }
    parts.join(".")
}

/// Best-effort dotted module for a loosely formatted relative path string.
///
/// Used when inferring where an unresolved call might live from the file
/// paths of the evidence that mentions it.
pub fn module_from_loose_path(file_path: &str) -> String {
    let trimmed = file_path.strip_suffix(".py").unwrap_or(file_path);
    trimmed.replace(['/', '\\'], ".")
}
