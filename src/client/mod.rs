//! Storage node client
//!
//! Async client for the node's RPC surface.

pub mod session;

pub use session::Client;
