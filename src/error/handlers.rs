//! Error handlers
//!
//! Converts internal errors into wire status values.

use log::{error, warn};

use crate::error::types::{DispatchError, ErrorKind, StorageError};
use crate::protocol::{RpcStatus, StatusCode};

/// Map an error kind onto its wire status code
pub fn kind_to_status_code(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::InvalidArgument,
        ErrorKind::NotFound => StatusCode::NotFound,
        ErrorKind::Internal => StatusCode::Internal,
    }
}

impl From<StorageError> for RpcStatus {
    fn from(err: StorageError) -> Self {
        let code = kind_to_status_code(err.kind());
        if code == StatusCode::Internal {
            error!("Storage failure: {}", err);
        }
        RpcStatus::new(code, err.to_string())
    }
}

impl From<DispatchError> for RpcStatus {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::ShuttingDown => {
                warn!("Rejected request: dispatcher shutting down");
                RpcStatus::unavailable("Server is shutting down")
            }
            other => {
                error!("Dispatch failure: {}", other);
                RpcStatus::internal(other.to_string())
            }
        }
    }
}
