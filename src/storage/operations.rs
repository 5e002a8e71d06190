//! Storage operations
//!
//! Handles file system operations for every RPC verb: write, create directory, move,
//! rename, delete, list and read. All paths go through [`resolve_path`] first.

use log::{debug, error, info};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use crate::error::StorageError;
use crate::storage::locks::PathLocks;
use crate::storage::metadata::describe;
use crate::storage::results::{
    CreateDirResult, DeleteResult, ListResult, OperationResult, ReadResult, RenameResult,
    WriteResult,
};
use crate::storage::validation::{relative_display, resolve_path, validate_name};

const MAX_RETRIES: u64 = 3;
const TEMP_SUFFIX: &str = ".tmp";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// File operations scoped to one storage root
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    locks: PathLocks,
}

impl FileStore {
    /// Opens (creating if needed) the storage root.
    pub fn open(root: impl AsRef<Path>, path_locking: bool) -> OperationResult<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(|e| {
            StorageError::io(format!("Failed to create storage root {}", root.display()), e)
        })?;
        let root = root.canonicalize().map_err(|e| {
            StorageError::io(
                format!("Failed to canonicalize storage root {}", root.display()),
                e,
            )
        })?;

        info!(
            "Storage root: {} (path locking {})",
            root.display(),
            if path_locking { "on" } else { "off" }
        );

        Ok(Self {
            root,
            locks: PathLocks::new(path_locking),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, relative: &str) -> OperationResult<PathBuf> {
        resolve_path(&self.root, relative)
    }

    /// Writes `content` to `filename`, inside `directory` when one is given.
    ///
    /// Existing files are overwritten. The content lands in a temporary sibling first and
    /// is renamed into place, so readers never observe a partial file.
    pub fn write(
        &self,
        filename: &str,
        content: &[u8],
        directory: Option<&str>,
    ) -> OperationResult<WriteResult> {
        validate_name(filename)?;

        fs::create_dir_all(&self.root).map_err(|e| {
            StorageError::io(
                format!("Failed to create storage root {}", self.root.display()),
                e,
            )
        })?;

        let directory = directory.map(str::trim).filter(|d| !d.is_empty());
        let parent = match directory {
            Some(dir) => {
                let dir_path = self.resolve(dir)?;
                fs::create_dir_all(&dir_path).map_err(|e| {
                    StorageError::io(format!("Failed to create directory {}", dir), e)
                })?;
                dir_path
            }
            None => self.root.clone(),
        };

        let file_path = parent.join(filename);
        let virtual_path = relative_display(&self.root, &file_path);
        // Re-check once the parent exists so a symlinked directory cannot redirect the write.
        let file_path = self.resolve(&virtual_path)?;

        let _guard = self.locks.lock(&[file_path.as_path()]);

        if file_path.is_dir() {
            return Err(StorageError::IsADirectory(virtual_path));
        }

        write_atomically(&file_path, content).map_err(|e| {
            error!(
                "Failed to write {} (real: {}): {}",
                virtual_path,
                file_path.display(),
                e
            );
            StorageError::io(format!("Failed to write {}", virtual_path), e)
        })?;

        info!(
            "Wrote {} bytes to {} (real: {})",
            content.len(),
            virtual_path,
            file_path.display()
        );

        Ok(WriteResult {
            file_path,
            virtual_path,
            name: filename.to_string(),
            metadata: describe(content, filename),
        })
    }

    /// Creates `path` and any missing ancestors. Succeeds if it already exists.
    pub fn create_directory(&self, path: &str) -> OperationResult<CreateDirResult> {
        if path.trim().is_empty() {
            return Err(StorageError::InvalidInput("Empty directory path".into()));
        }
        self.make_dirs(path)
    }

    /// Creates `name` under `parent`, creating `parent` too if needed.
    pub fn create_subdirectory(&self, parent: &str, name: &str) -> OperationResult<CreateDirResult> {
        if parent.trim().is_empty() || name.trim().is_empty() {
            return Err(StorageError::InvalidInput(
                "Parent directory and subdirectory name must not be empty".into(),
            ));
        }
        if Path::new(name).has_root() {
            return Err(StorageError::PathTraversal(format!("{} is absolute", name)));
        }
        let parent_path = self.resolve(parent)?;
        let combined = format!("{}/{}", parent.trim_end_matches('/'), name);
        let dir_path = self.resolve(&combined)?;
        if dir_path == parent_path || !dir_path.starts_with(&parent_path) {
            return Err(StorageError::InvalidPath(format!(
                "{} does not name a directory inside {}",
                name, parent
            )));
        }
        self.make_dirs(&combined)
    }

    fn make_dirs(&self, relative: &str) -> OperationResult<CreateDirResult> {
        let dir_path = self.resolve(relative)?;
        if dir_path == self.root {
            return Err(StorageError::InvalidPath(format!(
                "{} resolves to the storage root",
                relative
            )));
        }
        let virtual_path = relative_display(&self.root, &dir_path);

        let _guard = self.locks.lock(&[dir_path.as_path()]);
        fs::create_dir_all(&dir_path).map_err(|e| {
            StorageError::io(format!("Failed to create directory {}", virtual_path), e)
        })?;

        info!(
            "Created directory {} (real: {})",
            virtual_path,
            dir_path.display()
        );

        Ok(CreateDirResult {
            dir_path,
            virtual_path,
        })
    }

    /// Moves `source` to `destination`. The destination is the full target path.
    pub fn move_entry(&self, source: &str, destination: &str) -> OperationResult<RenameResult> {
        self.rename_within(source, destination, "move")
    }

    /// Renames `old_path` to `new_path`.
    pub fn rename(&self, old_path: &str, new_path: &str) -> OperationResult<RenameResult> {
        self.rename_within(old_path, new_path, "rename")
    }

    fn rename_within(&self, from: &str, to: &str, verb: &str) -> OperationResult<RenameResult> {
        if from.trim().is_empty() || to.trim().is_empty() {
            return Err(StorageError::InvalidInput(format!(
                "Source and destination of a {} must not be empty",
                verb
            )));
        }

        let from_path = self.resolve(from)?;
        let to_path = self.resolve(to)?;
        if from_path == self.root || to_path == self.root {
            return Err(StorageError::InvalidPath(format!(
                "Cannot {} the storage root",
                verb
            )));
        }

        let from_virtual = relative_display(&self.root, &from_path);
        let to_virtual = relative_display(&self.root, &to_path);

        let _guard = self.locks.lock(&[from_path.as_path(), to_path.as_path()]);

        if fs::symlink_metadata(&from_path).is_err() {
            return Err(StorageError::NotFound(from_virtual));
        }

        fs::rename(&from_path, &to_path).map_err(|e| {
            error!(
                "Failed to {} {} -> {}: {}",
                verb, from_virtual, to_virtual, e
            );
            StorageError::io(
                format!("Failed to {} {} to {}", verb, from_virtual, to_virtual),
                e,
            )
        })?;

        info!(
            "{} {} -> {} (real: {} -> {})",
            capitalize(verb),
            from_virtual,
            to_virtual,
            from_path.display(),
            to_path.display()
        );

        Ok(RenameResult {
            from: from_virtual,
            to: to_virtual,
        })
    }

    /// Deletes a file, or a directory and everything below it.
    ///
    /// A missing target is reported as [`DeleteResult::Missing`], not as an error.
    pub fn delete(&self, path: &str) -> OperationResult<DeleteResult> {
        if path.trim().is_empty() {
            return Err(StorageError::InvalidInput("Empty path".into()));
        }

        let target = self.resolve(path)?;
        if target == self.root {
            return Err(StorageError::InvalidPath(
                "Cannot delete the storage root".into(),
            ));
        }
        let virtual_path = relative_display(&self.root, &target);

        let _guard = self.locks.lock(&[target.as_path()]);

        let metadata = match fs::symlink_metadata(&target) {
            Ok(metadata) => metadata,
            Err(e) if is_absent(&e) => {
                debug!("Delete of missing {} is a no-op", virtual_path);
                return Ok(DeleteResult::Missing);
            }
            Err(e) => {
                return Err(StorageError::io(
                    format!("Failed to inspect {}", virtual_path),
                    e,
                ));
            }
        };

        let (outcome, removal) = if metadata.is_dir() {
            (
                DeleteResult::DirectoryRemoved,
                with_retries(|| fs::remove_dir_all(&target)),
            )
        } else {
            (
                DeleteResult::FileRemoved,
                with_retries(|| fs::remove_file(&target)),
            )
        };

        match removal {
            Ok(()) => {
                info!(
                    "Deleted {} (real: {})",
                    virtual_path,
                    target.display()
                );
                Ok(outcome)
            }
            // Lost a race with another remover; the target is gone either way.
            Err(e) if is_absent(&e) => Ok(DeleteResult::Missing),
            Err(e) => {
                error!(
                    "Failed to delete {} (real: {}): {}",
                    virtual_path,
                    target.display(),
                    e
                );
                Err(StorageError::io(format!("Failed to delete {}", virtual_path), e))
            }
        }
    }

    /// Names of every immediate child of `path`
    pub fn list_files(&self, path: &str) -> OperationResult<Vec<String>> {
        let listing = self.read_directory(path)?;
        Ok(listing.into_iter().map(|(name, _)| name).collect())
    }

    /// Names of the immediate subdirectories of `path`
    pub fn list_directories(&self, path: &str) -> OperationResult<Vec<String>> {
        let listing = self.read_directory(path)?;
        Ok(listing
            .into_iter()
            .filter(|(_, is_dir)| *is_dir)
            .map(|(name, _)| name)
            .collect())
    }

    /// Immediate children of `path`, partitioned into files and directories
    pub fn list_all(&self, path: &str) -> OperationResult<ListResult> {
        let mut result = ListResult::default();
        for (name, is_dir) in self.read_directory(path)? {
            if is_dir {
                result.directories.push(name);
            } else {
                result.files.push(name);
            }
        }
        Ok(result)
    }

    fn read_directory(&self, path: &str) -> OperationResult<Vec<(String, bool)>> {
        let real_path = self.resolve(path)?;
        let virtual_path = relative_display(&self.root, &real_path);

        let entries = with_retries(|| fs::read_dir(&real_path)).map_err(|e| {
            error!(
                "Failed to list directory {} (real: {}): {}",
                virtual_path,
                real_path.display(),
                e
            );
            StorageError::DirectoryNotFound(format!("{}: {}", display_or_root(&virtual_path), e))
        })?;

        let listing: Vec<(String, bool)> = entries
            .flatten()
            .filter(|entry| !is_temp_file_name(&entry.file_name().to_string_lossy()))
            .map(|entry| {
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                (entry.file_name().to_string_lossy().into_owned(), is_dir)
            })
            .collect();

        info!(
            "Listed directory {} (real: {}) - {} entries",
            display_or_root(&virtual_path),
            real_path.display(),
            listing.len()
        );

        Ok(listing)
    }

    /// Reads a whole file.
    pub fn read(&self, path: &str) -> OperationResult<ReadResult> {
        if path.trim().is_empty() {
            return Err(StorageError::InvalidInput("Empty path".into()));
        }

        let file_path = self.resolve(path)?;
        let virtual_path = relative_display(&self.root, &file_path);

        let metadata = match fs::metadata(&file_path) {
            Ok(metadata) => metadata,
            Err(e) if is_absent(&e) => {
                return Err(StorageError::NotFound(virtual_path));
            }
            Err(e) => {
                return Err(StorageError::io(format!("Failed to inspect {}", virtual_path), e));
            }
        };
        if metadata.is_dir() {
            return Err(StorageError::IsADirectory(virtual_path));
        }

        let content = fs::read(&file_path)
            .map_err(|e| StorageError::io(format!("Failed to read {}", virtual_path), e))?;

        let name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let metadata = describe(&content, &name);

        info!(
            "Read {} bytes from {} (real: {})",
            content.len(),
            virtual_path,
            file_path.display()
        );

        Ok(ReadResult {
            name,
            virtual_path,
            content,
            metadata,
        })
    }
}

/// Writes to a temporary sibling of `target`, then renames it over `target`.
fn write_atomically(target: &Path, content: &[u8]) -> io::Result<()> {
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = target.with_file_name(format!(
        ".{}.{}-{}{}",
        file_name,
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed),
        TEMP_SUFFIX
    ));

    let written = fs::File::create(&temp_path).and_then(|mut file| {
        file.write_all(content)?;
        file.flush()?;
        file.sync_all()
    });

    let renamed = written.and_then(|()| fs::rename(&temp_path, target));
    if renamed.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    renamed
}

/// Matches the `.{name}.{pid}-{n}.tmp` names produced by [`write_atomically`].
fn is_temp_file_name(name: &str) -> bool {
    let Some(inner) = name
        .strip_prefix('.')
        .and_then(|n| n.strip_suffix(TEMP_SUFFIX))
    else {
        return false;
    };
    let Some((_, tag)) = inner.rsplit_once('.') else {
        return false;
    };
    let Some((pid, counter)) = tag.split_once('-') else {
        return false;
    };
    let is_number = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    is_number(pid) && is_number(counter)
}

/// Missing target, or a path that runs through a regular file.
fn is_absent(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

/// Retries `op` when it fails with a permission error, backing off between attempts.
fn with_retries<T>(mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    let mut attempt = 1;
    loop {
        match op() {
            Err(e) if attempt < MAX_RETRIES && e.kind() == io::ErrorKind::PermissionDenied => {
                thread::sleep(Duration::from_millis(100 * attempt));
                attempt += 1;
            }
            other => return other,
        }
    }
}

fn display_or_root(virtual_path: &str) -> &str {
    if virtual_path.is_empty() { "/" } else { virtual_path }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
