//! RPC protocol implementation
//!
//! Handles frame encoding, message definitions and per-call handlers.

pub mod codec;
pub mod handlers;
pub mod messages;

pub use codec::{FrameError, decode_request, read_frame, write_frame};
pub use handlers::FileService;
pub use messages::*;
