//! Storage result types
//!
//! Defines result structures returned by storage operations.

use std::path::PathBuf;

use crate::error::StorageError;
use crate::storage::metadata::FileMetadata;

/// Result alias used by every [`FileStore`](crate::storage::FileStore) operation
pub type OperationResult<T> = Result<T, StorageError>;

/// Result of a file write
#[derive(Debug, Clone)]
pub struct WriteResult {
    pub file_path: PathBuf,
    pub virtual_path: String,
    pub name: String,
    pub metadata: FileMetadata,
}

/// Result of a directory creation
#[derive(Debug, Clone)]
pub struct CreateDirResult {
    pub dir_path: PathBuf,
    pub virtual_path: String,
}

/// Result of a move or rename
#[derive(Debug, Clone)]
pub struct RenameResult {
    pub from: String,
    pub to: String,
}

/// Result of a delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteResult {
    FileRemoved,
    DirectoryRemoved,
    /// Nothing existed at the target; the postcondition already held.
    Missing,
}

/// Immediate children of a directory, in directory read order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListResult {
    pub files: Vec<String>,
    pub directories: Vec<String>,
}

/// Result of a file read
#[derive(Debug, Clone)]
pub struct ReadResult {
    pub name: String,
    pub virtual_path: String,
    pub content: Vec<u8>,
    pub metadata: FileMetadata,
}
