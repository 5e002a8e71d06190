//! Error types
//!
//! Defines domain-specific error types for each module of the storage node.

use std::io;
use thiserror::Error;

/// Outcome classes every storage failure is projected onto before it leaves the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Internal,
}

/// Storage module errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Path escapes storage root: {0}")]
    PathTraversal(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Is a directory: {0}")]
    IsADirectory(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    /// Wraps an I/O failure with a short description of what was being attempted.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        StorageError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::InvalidInput(_)
            | StorageError::InvalidPath(_)
            | StorageError::PathTraversal(_)
            | StorageError::IsADirectory(_) => ErrorKind::InvalidInput,
            StorageError::NotFound(_) | StorageError::DirectoryNotFound(_) => ErrorKind::NotFound,
            StorageError::Io { .. } => ErrorKind::Internal,
        }
    }
}

/// Worker pool errors
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Dispatcher is shutting down")]
    ShuttingDown,

    #[error("Work item panicked: {0}")]
    Panicked(String),

    #[error("Worker dropped the work item before completion")]
    WorkerLost,

    #[error("Invalid dispatcher configuration: {0}")]
    InvalidConfig(String),
}

/// Startup and transport errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Storage root unusable: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Client-side errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Connection error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed frame: {0}")]
    Codec(#[from] serde_json::Error),

    #[error(transparent)]
    Frame(#[from] crate::protocol::FrameError),

    #[error("Server closed the connection")]
    Disconnected,

    #[error("Request failed with {0}")]
    Status(crate::protocol::RpcStatus),

    #[error("Unexpected reply for {0}")]
    UnexpectedReply(&'static str),

    #[error("Undecodable content: {0}")]
    Decode(String),
}
