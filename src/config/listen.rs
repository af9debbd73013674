//! Network listener configuration.

use serde::Deserialize;
use std::net::SocketAddr;

/// Network listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Address to bind to (e.g., "0.0.0.0:8080").
    pub address: SocketAddr,
    /// Maximum accepted line length in bytes.
    #[serde(default = "super::defaults::default_max_line_length")]
    pub max_line_length: usize,
    /// Per-session outbound queue depth. A session whose queue is full is
    /// treated as a failed delivery and dropped.
    #[serde(default = "super::defaults::default_outbound_queue")]
    pub outbound_queue: usize,
}

impl ListenConfig {
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            max_line_length: super::defaults::default_max_line_length(),
            outbound_queue: super::defaults::default_outbound_queue(),
        }
    }
}
