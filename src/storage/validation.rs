//! Path validation
//!
//! Resolves client-supplied relative paths against the storage root and rejects
//! anything that would land outside of it.

use std::path::{Component, Path, PathBuf};

use crate::error::StorageError;

/// Maximum number of path segments accepted in a single request
pub const MAX_DIRECTORY_DEPTH: usize = 64;

/// Resolves `relative` under `root`.
///
/// `root` must already be canonical. The relative path is normalized lexically
/// (`.` dropped, `..` popped) and then the deepest existing ancestor of the result is
/// canonicalized so that symlinks cannot be used to step out of the root. An empty
/// relative path resolves to `root` itself; callers decide whether that is allowed.
pub fn resolve_path(root: &Path, relative: &str) -> Result<PathBuf, StorageError> {
    if relative.contains('\0') {
        return Err(StorageError::InvalidPath(format!(
            "{:?} contains a NUL byte",
            relative
        )));
    }

    let mut normalized = PathBuf::new();
    let mut depth = 0usize;

    for component in Path::new(relative).components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                return Err(StorageError::PathTraversal(format!(
                    "{} is absolute",
                    relative
                )));
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(StorageError::PathTraversal(relative.to_string()));
                }
                normalized.pop();
                depth -= 1;
            }
            Component::Normal(segment) => {
                normalized.push(segment);
                depth += 1;
                if depth > MAX_DIRECTORY_DEPTH {
                    return Err(StorageError::InvalidPath(format!(
                        "{} is nested deeper than {} levels",
                        relative, MAX_DIRECTORY_DEPTH
                    )));
                }
            }
        }
    }

    let resolved = root.join(&normalized);
    ensure_within_root(root, &resolved, relative)?;
    Ok(resolved)
}

/// Checks that the deepest existing ancestor of `resolved` is still inside `root`
/// once symlinks are followed.
fn ensure_within_root(root: &Path, resolved: &Path, relative: &str) -> Result<(), StorageError> {
    let mut probe = resolved;
    while !probe.exists() {
        match probe.parent() {
            Some(parent) if parent.starts_with(root) => probe = parent,
            _ => return Ok(()),
        }
    }

    let canonical = probe
        .canonicalize()
        .map_err(|e| StorageError::io(format!("Failed to canonicalize {}", probe.display()), e))?;

    if canonical.starts_with(root) {
        Ok(())
    } else {
        Err(StorageError::PathTraversal(format!(
            "{} resolves outside the storage root",
            relative
        )))
    }
}

/// Validates a bare entry name (a single path segment).
pub fn validate_name(name: &str) -> Result<(), StorageError> {
    if name.trim().is_empty() {
        return Err(StorageError::InvalidInput("Empty name".into()));
    }
    if name == "." || name == ".." || name.contains('/') || name.contains('\\') {
        return Err(StorageError::InvalidPath(format!(
            "{} is not a plain file name",
            name
        )));
    }
    if name.contains('\0') {
        return Err(StorageError::InvalidPath(format!("{:?} contains a NUL byte", name)));
    }
    Ok(())
}

/// Converts a real path back to the slash-separated form clients use.
pub fn relative_display(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
