//! File system storage management
//!
//! Handles path validation, file operations, metadata detection and per-path locking.

pub mod locks;
pub mod metadata;
pub mod operations;
pub mod results;
pub mod validation;

pub use metadata::{FileMetadata, describe};
pub use operations::FileStore;
pub use results::*;
pub use validation::{MAX_DIRECTORY_DEPTH, resolve_path};
