//! Project-relative path rules shared by the tree, the project and the backends.

use crate::error::{ProjectError, ProjectResult};

pub const SEPARATOR: char = '/';

/// Normalize and validate a project-relative file path.
///
/// A single leading `/` is tolerated and stripped; everything else that could
/// address something other than a file below the root is rejected.
pub fn normalize(path: &str) -> ProjectResult<String> {
    let clean = path.strip_prefix(SEPARATOR).unwrap_or(path);

    if clean.is_empty() {
        return Err(ProjectError::InvalidPath("empty path".into()));
    }

    if clean.contains('\\') {
        return Err(ProjectError::InvalidPath(format!(
            "backslash in path: {}",
            path
        )));
    }

    for segment in clean.split(SEPARATOR) {
        match segment {
            "" => {
                return Err(ProjectError::InvalidPath(format!(
                    "empty path component: {}",
                    path
                )));
            }
            "." | ".." => {
                return Err(ProjectError::InvalidPath(format!(
                    "relative component in path: {}",
                    path
                )));
            }
            _ => {}
        }
    }

    Ok(clean.to_string())
}

/// Split a normalized path on its last separator into `(parent, leaf)`.
/// The parent is empty for top-level entries.
pub fn split_parent(path: &str) -> (&str, &str) {
    match path.rsplit_once(SEPARATOR) {
        Some((parent, leaf)) => (parent, leaf),
        None => ("", path),
    }
}

/// Iterate the non-empty segments of a path.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(SEPARATOR).filter(|s| !s.is_empty())
}

pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}{}{}", parent, SEPARATOR, name)
    }
}
