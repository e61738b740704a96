//! Path helpers shared by the entry table, resolver, and classifier
//!
//! All engine state is keyed on normalized absolute paths; these helpers
//! are the single place that normalization happens.

use std::path::{Component, Path, PathBuf};

/// File extensions treated as stylesheets
pub const STYLESHEET_EXTENSIONS: [&str; 3] = ["scss", "sass", "css"];

/// Check whether a path carries a recognized stylesheet extension
pub fn has_stylesheet_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| STYLESHEET_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

/// Check whether a path names a partial (basename begins with `_`)
pub fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('_'))
        .unwrap_or(false)
}

/// Lexically normalize a path, resolving `.` and `..` components
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component.as_os_str());
                }
            }
            _ => out.push(component.as_os_str()),
        }
    }
    out
}

/// Make a path absolute relative to the current directory, normalized
pub fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        let cwd = std::env::current_dir().unwrap_or_default();
        normalize(&cwd.join(path))
    }
}

/// Canonical key for a path, tolerant of the path not existing
///
/// Symlinked temp directories (macOS `/var` vs `/private/var`) would
/// otherwise give the watcher different keys than the entry table.
pub fn canonical(path: &Path) -> PathBuf {
    let abs = absolutize(path);
    if let Ok(resolved) = abs.canonicalize() {
        return resolved;
    }
    if let (Some(parent), Some(name)) = (abs.parent(), abs.file_name()) {
        if let Ok(resolved) = parent.canonicalize() {
            return resolved.join(name);
        }
    }
    abs
}

/// Render a path relative to the current directory when possible
pub fn display_rel(path: &Path) -> String {
    let cwd = std::env::current_dir().unwrap_or_default();
    match path.strip_prefix(&cwd) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel.display().to_string(),
        _ => path.display().to_string(),
    }
}
