//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config and its sections)
//! - [`listen`]: Network listener configuration (ListenConfig)
//! - [`defaults`]: serde default value functions
//! - [`validation`]: startup validation

mod defaults;
mod listen;
mod types;
mod validation;

pub use listen::ListenConfig;
pub use types::{
    Config, ConfigError, DatabaseConfig, LoginConfig, PresentationConfig, ServerConfig,
    ShutdownConfig,
};
pub use validation::{ValidationError, validate};
