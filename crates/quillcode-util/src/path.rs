//! Path utilities.

use std::path::{Path, PathBuf};

/// Get the quillcode data directory.
///
/// This follows XDG conventions:
/// - `$XDG_DATA_HOME/quillcode` if set
/// - `~/.local/share/quillcode` otherwise
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|p| p.join("quillcode"))
}

/// Check if a path is within a base directory.
///
/// This is used for security checks to prevent path traversal.
pub fn is_within(path: &Path, base: &Path) -> bool {
    let canonical_path = path.canonicalize().ok();
    let canonical_base = base.canonicalize().ok();

    match (canonical_path, canonical_base) {
        (Some(p), Some(b)) => p.starts_with(&b),
        // If we can't canonicalize, fall back to a prefix check.
        _ => path.starts_with(base),
    }
}

/// Normalize a path by removing `.` and `..` components.
///
/// Unlike `canonicalize`, this doesn't require the path to exist.
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();

    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                result.pop();
            }
            std::path::Component::CurDir => {}
            _ => {
                result.push(component);
            }
        }
    }

    result
}

/// Resolve a possibly-relative path against a working directory.
pub fn resolve(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&cwd.join(path))
    }
}
