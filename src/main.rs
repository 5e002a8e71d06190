//! Storage node - Entry Point
//!
//! Exposes one sandboxed directory tree over a line-delimited JSON RPC interface.

use log::{error, info, warn};
use std::process::ExitCode;

use storage_node::{Server, ServerConfig};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = dotenvy::dotenv() {
        // A missing .env is the normal case outside development.
        if !e.not_found() {
            eprintln!("Failed to load .env: {}", e);
        }
    }

    // Initialize the logger (env_logger picks up RUST_LOG environment variable)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            warn!("Invalid configuration ({}), falling back to defaults", e);
            ServerConfig::default()
        }
    };

    info!("Launching storage node {}...", config.node_id);

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Server startup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match server.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}
