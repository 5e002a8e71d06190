//! Configuration management for the storage node
//!
//! Values are layered, lowest priority first: built-in defaults, an optional
//! `config.toml`, `STORAGE_NODE_*` environment variables, and finally a bare `PORT`
//! variable kept for compatibility with older deployments.

use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "STORAGE_NODE";

/// Complete node configuration, loaded once at startup
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// IP address to bind the RPC listener
    pub bind_address: String,

    /// RPC listener port (0 picks an ephemeral port)
    pub port: u16,

    /// Identifier reported back in upload responses
    pub node_id: String,

    /// Directory every client path is resolved against
    pub storage_root: String,

    /// Number of concurrent filesystem handlers
    pub worker_count: usize,

    /// Pending calls allowed before submitters start waiting
    pub queue_capacity: usize,

    /// Largest accepted request frame in bytes
    pub max_frame_bytes: usize,

    /// Serialise mutations that target the same path
    pub path_locking: bool,

    /// How long a closing connection waits for its client to take pending responses
    pub drain_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 50051,
            node_id: "node-1".to_string(),
            storage_root: "storage".to_string(),
            worker_count: 4,
            queue_capacity: 100,
            max_frame_bytes: 64 * 1024 * 1024,
            path_locking: true,
            drain_timeout_ms: 30_000,
        }
    }
}

impl ServerConfig {
    /// Load configuration from `config.toml` (if present) with environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = Self::defaults()?
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .try_parsing(true),
            )
            .set_override_option("port", std::env::var("PORT").ok())?;

        Self::finish(builder)
    }

    /// Load configuration from an explicit TOML file, without environment overrides
    pub fn load_from(path: &Path) -> Result<Self, config::ConfigError> {
        let builder = Self::defaults()?.add_source(File::from(path));
        Self::finish(builder)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
        let d = ServerConfig::default();
        Config::builder()
            .set_default("bind_address", d.bind_address)?
            .set_default("port", d.port as i64)?
            .set_default("node_id", d.node_id)?
            .set_default("storage_root", d.storage_root)?
            .set_default("worker_count", d.worker_count as i64)?
            .set_default("queue_capacity", d.queue_capacity as i64)?
            .set_default("max_frame_bytes", d.max_frame_bytes as i64)?
            .set_default("path_locking", d.path_locking)?
            .set_default("drain_timeout_ms", d.drain_timeout_ms as i64)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self, config::ConfigError> {
        let config: ServerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "bind_address cannot be empty".into(),
            ));
        }

        if self.storage_root.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "storage_root cannot be empty".into(),
            ));
        }

        if self.worker_count == 0 {
            return Err(config::ConfigError::Message(
                "worker_count must be greater than 0".into(),
            ));
        }

        if self.queue_capacity == 0 {
            return Err(config::ConfigError::Message(
                "queue_capacity must be greater than 0".into(),
            ));
        }

        if self.max_frame_bytes == 0 {
            return Err(config::ConfigError::Message(
                "max_frame_bytes must be greater than 0".into(),
            ));
        }

        if self.drain_timeout_ms == 0 {
            return Err(config::ConfigError::Message(
                "drain_timeout_ms must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Bind address and port as a socket address string
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn storage_root_path(&self) -> PathBuf {
        PathBuf::from(&self.storage_root)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}
