//! Server configuration

use crate::{Error, Result};
use serde::Deserialize;
use std::net::SocketAddr;

/// Server configuration
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// hostname = "127.0.0.1"
/// port = 8080
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub hostname: String,
    pub port: u16,
    /// Runtime worker threads for [`crate::Engine::run_blocking`]
    pub workers: usize,
    /// Largest request body accepted before answering 413
    pub max_body_size: usize,
    /// How long shutdown waits for open connections to finish
    pub drain_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: "0.0.0.0".to_string(),
            port: 3000,
            workers: num_cpus::get(),
            max_body_size: 4 * 1024 * 1024,
            drain_timeout_ms: 5_000,
        }
    }
}

impl ServerConfig {
    /// Parse a TOML document
    pub fn from_toml(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Read and parse a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    /// The socket address to listen on
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.hostname, self.port)
            .parse()
            .map_err(|e| Error::InvalidAddress(format!("{}:{}: {}", self.hostname, self.port, e)))
    }
}
