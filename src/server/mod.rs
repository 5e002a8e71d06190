//! Server core functionality
//!
//! Listener, per-connection handling and graceful shutdown.

pub mod connection;
pub mod core;

pub use core::{Server, shutdown_signal};
