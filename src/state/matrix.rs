//! The Matrix - Central shared state for the chat server.
//!
//! The Matrix ties together the session registry, the credential store and
//! the shutdown controller, and carries the configuration handlers need.

use crate::config::{Config, LoginConfig};
use crate::db::CredentialStore;
use crate::markup::{ColorMode, Markup};
use crate::state::{Registry, ShutdownController};
use std::sync::Arc;

/// This server's identity information.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
}

/// Configuration accessible to handlers and connections via Matrix.
#[derive(Debug, Clone)]
pub struct MatrixConfig {
    pub login: LoginConfig,
    pub max_line_length: usize,
    pub outbound_queue: usize,
}

/// The Matrix - Central shared state container.
pub struct Matrix {
    /// This server's identity.
    pub server_info: ServerInfo,

    /// Active sessions keyed by nickname.
    pub registry: Arc<Registry>,

    /// Account storage.
    pub store: Arc<dyn CredentialStore>,

    /// Shutdown sequencing.
    pub shutdown: Arc<ShutdownController>,

    pub config: MatrixConfig,
}

impl Matrix {
    /// Create a new Matrix with the given server configuration.
    pub fn new(config: &Config, store: Arc<dyn CredentialStore>) -> Self {
        let markup = Markup::server(ColorMode::from_enabled(config.presentation.color));
        let registry = Arc::new(Registry::new(markup));
        let shutdown = Arc::new(ShutdownController::new(
            Arc::clone(&registry),
            config.server.name.clone(),
            config.shutdown.drain_timeout(),
        ));

        Self {
            server_info: ServerInfo {
                name: config.server.name.clone(),
            },
            registry,
            store,
            shutdown,
            config: MatrixConfig {
                login: config.login.clone(),
                max_line_length: config.listen.max_line_length,
                outbound_queue: config.listen.outbound_queue,
            },
        }
    }

    /// Renderer for server-styled output.
    pub fn markup(&self) -> &Markup {
        self.registry.markup()
    }
}
