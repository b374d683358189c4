//! Coordination path normalization.

use locator_core::{LocatorError, LocatorResult};

/// Normalizes a service path to its canonical absolute form.
///
/// A missing leading `/` is added. Empty segments (`//`), a trailing `/`
/// on anything but the root, and NUL characters are rejected.
///
/// # Errors
///
/// - `LocatorError::InvalidPath` describing the first problem found
pub fn normalize_path(path: &str) -> LocatorResult<String> {
    if path.is_empty() {
        return Err(LocatorError::invalid_path(path, "must not be empty"));
    }
    if path.contains('\0') {
        return Err(LocatorError::invalid_path(path, "must not contain NUL"));
    }

    let absolute = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };

    if absolute == "/" {
        return Ok(absolute);
    }
    if absolute.ends_with('/') {
        return Err(LocatorError::invalid_path(path, "must not end with '/'"));
    }
    if absolute.contains("//") {
        return Err(LocatorError::invalid_path(path, "empty path segment"));
    }

    Ok(absolute)
}

/// Joins a parent path and a child name.
pub(crate) fn child_path(parent: &str, child: &str) -> String {
    if parent == "/" {
        format!("/{child}")
    } else {
        format!("{parent}/{child}")
    }
}
