//! Frame codec
//!
//! Newline-delimited JSON framing with an upper bound on frame size.

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::messages::{RequestFrame, RpcStatus};

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Frame exceeds {0} bytes")]
    TooLarge(usize),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Reads one frame, without its line terminator.
///
/// Returns `Ok(None)` on a clean end of stream. A frame longer than `max_len` is an
/// error; the stream cannot be resynchronised after it.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    // Room for the body plus a CRLF terminator; anything longer is over the limit.
    let limit = max_len as u64 + 2;
    let n = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    if buf.len() > max_len {
        return Err(FrameError::TooLarge(max_len));
    }

    Ok(Some(buf))
}

/// Serializes `frame` as one line and flushes it.
pub async fn write_frame<W, T>(writer: &mut W, frame: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut bytes = serde_json::to_vec(frame).map_err(io::Error::other)?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await
}

#[derive(Deserialize)]
struct FrameId {
    #[serde(default)]
    id: u64,
}

/// Decodes a request, recovering the request id for the error reply when possible.
pub fn decode_request(bytes: &[u8]) -> Result<RequestFrame, (u64, RpcStatus)> {
    serde_json::from_slice::<RequestFrame>(bytes).map_err(|e| {
        let id = serde_json::from_slice::<FrameId>(bytes)
            .map(|f| f.id)
            .unwrap_or(0);
        (id, RpcStatus::invalid_argument(format!("Malformed request: {}", e)))
    })
}
