//! Error handling
//!
//! Defines error types and their mapping onto wire status codes.

pub mod handlers;
pub mod types;

pub use types::*;
