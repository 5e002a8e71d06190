//! Per-path locking
//!
//! Serialises mutating operations that target the same normalized path.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

#[derive(Debug, Default)]
struct LockTable {
    held: HashSet<PathBuf>,
}

/// Table of paths currently being mutated.
///
/// Locks are exact-path: a lock on `a/b.txt` does not exclude a concurrent delete of
/// `a`.
#[derive(Debug, Clone)]
pub struct PathLocks {
    inner: Arc<(Mutex<LockTable>, Condvar)>,
    enabled: bool,
}

impl PathLocks {
    pub fn new(enabled: bool) -> Self {
        Self {
            inner: Arc::default(),
            enabled,
        }
    }

    /// Blocks until every path in `paths` is free, then holds them all.
    ///
    /// Paths are taken in sorted order and duplicates collapse, so two callers locking
    /// the same pair in opposite order cannot deadlock.
    pub fn lock(&self, paths: &[&Path]) -> PathGuard {
        if !self.enabled {
            return PathGuard {
                locks: self.clone(),
                paths: Vec::new(),
            };
        }

        let mut wanted: Vec<PathBuf> = paths.iter().map(|p| p.to_path_buf()).collect();
        wanted.sort();
        wanted.dedup();

        let (table, available) = &*self.inner;
        let mut guard = table.lock().unwrap_or_else(PoisonError::into_inner);
        while wanted.iter().any(|p| guard.held.contains(p)) {
            guard = available
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
        for path in &wanted {
            guard.held.insert(path.clone());
        }

        PathGuard {
            locks: self.clone(),
            paths: wanted,
        }
    }

    pub fn held_count(&self) -> usize {
        let (table, _) = &*self.inner;
        table.lock().unwrap_or_else(PoisonError::into_inner).held.len()
    }

    fn release(&self, paths: &[PathBuf]) {
        if paths.is_empty() {
            return;
        }
        let (table, available) = &*self.inner;
        let mut guard = table.lock().unwrap_or_else(PoisonError::into_inner);
        for path in paths {
            guard.held.remove(path);
        }
        available.notify_all();
    }
}

/// Releases its paths on drop
#[must_use = "paths are released as soon as the guard is dropped"]
pub struct PathGuard {
    locks: PathLocks,
    paths: Vec<PathBuf>,
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        self.locks.release(&self.paths);
    }
}
