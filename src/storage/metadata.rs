//! File metadata
//!
//! Size and media type detection for uploaded and downloaded content.

use std::path::Path;

/// Fallback for content that is neither recognised nor valid UTF-8
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Fallback for unrecognised content that is valid UTF-8
pub const PLAIN_TEXT: &str = "text/plain; charset=utf-8";

/// Size and media type of a blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub size_bytes: u64,
    pub mime_type: String,
}

/// Describes `bytes` stored under `filename`.
///
/// The media type is sniffed from the content first; a recognised filename extension
/// overrides the sniffed value.
pub fn describe(bytes: &[u8], filename: &str) -> FileMetadata {
    let sniffed = sniff(bytes);
    let by_extension = mime_guess::from_path(Path::new(filename))
        .first()
        .map(|mime| mime.essence_str().to_string());

    FileMetadata {
        size_bytes: bytes.len() as u64,
        mime_type: by_extension.unwrap_or(sniffed),
    }
}

fn sniff(bytes: &[u8]) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }
    if std::str::from_utf8(bytes).is_ok() {
        PLAIN_TEXT.to_string()
    } else {
        OCTET_STREAM.to_string()
    }
}
