//! Core configuration types and loading.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::defaults::*;
use super::listen::ListenConfig;
use crate::db::HashCost;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server identity.
    #[serde(default)]
    pub server: ServerConfig,
    /// Network listen configuration.
    pub listen: ListenConfig,
    /// Login budget.
    #[serde(default)]
    pub login: LoginConfig,
    /// Shutdown drain.
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    /// Credential store.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Terminal styling of server output.
    #[serde(default)]
    pub presentation: PresentationConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// A configuration with every section at its default, listening on `address`.
    pub fn with_listen(address: SocketAddr) -> Self {
        Self {
            server: ServerConfig::default(),
            listen: ListenConfig::new(address),
            login: LoginConfig::default(),
            shutdown: ShutdownConfig::default(),
            database: DatabaseConfig::default(),
            presentation: PresentationConfig::default(),
        }
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Name shown in the welcome banner and shutdown notices.
    #[serde(default = "default_server_name")]
    pub name: String,
    /// Prometheus metrics HTTP port (0 disables the endpoint).
    #[serde(default)]
    pub metrics_port: u16,
    /// Depth of the command dispatcher queue.
    #[serde(default = "default_command_queue")]
    pub command_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            metrics_port: 0,
            command_queue: default_command_queue(),
        }
    }
}

/// Login budget: one wall-clock deadline and a bounded number of attempts.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginConfig {
    #[serde(default = "default_login_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl LoginConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_login_timeout(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownConfig {
    /// Grace period for live connections to close once termination begins.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_secs: u64,
}

impl ShutdownConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: default_drain_timeout(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file, or `:memory:`.
    #[serde(default = "default_database_path")]
    pub path: String,
    /// Password given to the `admin` account when no admin exists yet.
    #[serde(default = "default_bootstrap_password")]
    pub bootstrap_admin_password: String,
    /// Argon2 memory cost in KiB.
    #[serde(default = "default_hash_memory_kib")]
    pub hash_memory_kib: u32,
    /// Argon2 iteration count.
    #[serde(default = "default_hash_iterations")]
    pub hash_iterations: u32,
}

impl DatabaseConfig {
    pub fn hash_cost(&self) -> HashCost {
        HashCost {
            memory_kib: self.hash_memory_kib,
            iterations: self.hash_iterations,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            bootstrap_admin_password: default_bootstrap_password(),
            hash_memory_kib: default_hash_memory_kib(),
            hash_iterations: default_hash_iterations(),
        }
    }
}

/// Presentation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PresentationConfig {
    /// Emit ANSI styling. When false, markup is stripped to plain text.
    #[serde(default = "default_true")]
    pub color: bool,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self { color: true }
    }
}
