//! Wire messages
//!
//! Request and response frames exchanged with clients, one JSON document per line.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How upload content is encoded inside the frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentEncoding {
    #[default]
    Base64,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFileRequest {
    pub filename: String,
    pub content: String,
    #[serde(default)]
    pub encoding: ContentEncoding,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRequest {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubdirectoryRequest {
    pub parent_directory: String,
    pub subdirectory_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameRequest {
    pub old_name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub source_path: String,
    pub destination_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub path: String,
}

/// One remote call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum Call {
    UploadFile(UploadFileRequest),
    CreateDirectory(DirectoryRequest),
    CreateSubdirectory(SubdirectoryRequest),
    DeleteFile(DeleteRequest),
    RenameFile(RenameRequest),
    MoveFile(MoveRequest),
    ListFiles(DirectoryRequest),
    ListDirectories(DirectoryRequest),
    ListAll(DirectoryRequest),
    DownloadFile(DownloadRequest),
}

impl Call {
    pub fn method(&self) -> &'static str {
        match self {
            Call::UploadFile(_) => "UploadFile",
            Call::CreateDirectory(_) => "CreateDirectory",
            Call::CreateSubdirectory(_) => "CreateSubdirectory",
            Call::DeleteFile(_) => "DeleteFile",
            Call::RenameFile(_) => "RenameFile",
            Call::MoveFile(_) => "MoveFile",
            Call::ListFiles(_) => "ListFiles",
            Call::ListDirectories(_) => "ListDirectories",
            Call::ListAll(_) => "ListAll",
            Call::DownloadFile(_) => "DownloadFile",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub id: u64,
    pub call: Call,
}

/// Plain status reply used by the mutating calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReply {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReply {
    pub message: String,
    pub file_path: String,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub node_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListReply {
    pub entries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListAllReply {
    pub files: Vec<String>,
    pub directories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadReply {
    pub content_base64: String,
    pub filename: String,
    pub size: u64,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reply {
    Status(StatusReply),
    Upload(UploadReply),
    List(ListReply),
    ListAll(ListAllReply),
    Download(DownloadReply),
}

/// Wire status codes, a subset of the gRPC codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Ok,
    InvalidArgument,
    NotFound,
    Internal,
    Unavailable,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusCode::Ok => "ok",
            StatusCode::InvalidArgument => "invalid_argument",
            StatusCode::NotFound => "not_found",
            StatusCode::Internal => "internal",
            StatusCode::Unavailable => "unavailable",
        };
        f.write_str(name)
    }
}

/// A failed call: code plus human-readable cause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcStatus {
    pub code: StatusCode,
    pub message: String,
}

impl RpcStatus {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StatusCode::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Unavailable, message)
    }
}

impl fmt::Display for RpcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub id: u64,
    pub status: StatusCode,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<Reply>,
}

impl ResponseFrame {
    pub fn from_result(id: u64, result: Result<Reply, RpcStatus>) -> Self {
        match result {
            Ok(reply) => Self {
                id,
                status: StatusCode::Ok,
                message: String::new(),
                reply: Some(reply),
            },
            Err(status) => Self::failure(id, status),
        }
    }

    pub fn failure(id: u64, status: RpcStatus) -> Self {
        Self {
            id,
            status: status.code,
            message: status.message,
            reply: None,
        }
    }

    pub fn into_result(self) -> Result<Reply, RpcStatus> {
        match (self.status, self.reply) {
            (StatusCode::Ok, Some(reply)) => Ok(reply),
            (StatusCode::Ok, None) => Err(RpcStatus::internal("ok response without a reply")),
            (code, _) => Err(RpcStatus::new(code, self.message)),
        }
    }
}
