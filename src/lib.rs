pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod server;
pub mod storage;

pub use client::Client;
pub use config::ServerConfig;
pub use dispatch::Dispatcher;
pub use server::Server;
