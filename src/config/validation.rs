//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.name is required")]
    MissingServerName,
    #[error("server.command_queue must be at least 1")]
    InvalidCommandQueue,
    #[error("login.max_attempts must be at least 1")]
    InvalidMaxAttempts,
    #[error("login.timeout_secs must be at least 1")]
    InvalidLoginTimeout,
    #[error("listen.outbound_queue must be at least 1")]
    InvalidOutboundQueue,
    #[error("database.path parent directory does not exist: {0}")]
    DatabasePathInvalid(String),
    #[error("database.hash_memory_kib must be at least 8, got {0}")]
    InvalidHashMemory(u32),
    #[error("database.hash_iterations must be at least 1")]
    InvalidHashIterations,
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.name.trim().is_empty() {
        errors.push(ValidationError::MissingServerName);
    }
    if config.server.command_queue == 0 {
        errors.push(ValidationError::InvalidCommandQueue);
    }

    if config.login.max_attempts == 0 {
        errors.push(ValidationError::InvalidMaxAttempts);
    }
    if config.login.timeout_secs == 0 {
        errors.push(ValidationError::InvalidLoginTimeout);
    }
    if config.listen.outbound_queue == 0 {
        errors.push(ValidationError::InvalidOutboundQueue);
    }

    let db = &config.database;
    if db.path != ":memory:" {
        let db_path = Path::new(&db.path);
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            errors.push(ValidationError::DatabasePathInvalid(db.path.clone()));
        }
    }
    // argon2 rejects memory below 8 KiB per lane
    if db.hash_memory_kib < 8 {
        errors.push(ValidationError::InvalidHashMemory(db.hash_memory_kib));
    }
    if db.hash_iterations == 0 {
        errors.push(ValidationError::InvalidHashIterations);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
