//! Request dispatch
//!
//! Bounded worker pool that gates every remote call.

mod pool;

pub use pool::Dispatcher;
