//! Unified error handling for slchatd.
//!
//! This module provides the error hierarchy shared by the registry, the
//! login state machine and the command handlers, with stable codes for
//! metric labeling and user-visible replies.

use crate::db::DbError;
use thiserror::Error;

/// Message sent to a non-admin who tries an admin command.
pub const ERR_PRIVILEGE: &str = "this is a system command, must be admin user to execute";

/// Message sent when a nickname fails the format check.
pub const ERR_ILLEGAL_NICKNAME: &str = "illegal nickname";

/// Message sent when the shutdown delay cannot be parsed.
pub const ERR_INVALID_SHUTDOWN_TIME: &str = "invalid shutdown time, specify <#seconds>";

// ============================================================================
// Chat Errors (registry and command processing)
// ============================================================================

/// Errors raised while acting on behalf of a single session.
///
/// None of these are fatal to the server: the dispatcher reports them to the
/// issuing session and moves on to the next command.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("nickname in use: {0}")]
    DuplicateNickname(String),

    #[error("illegal nickname")]
    IllegalNickname(String),

    #[error("delivery to {0} failed")]
    DeliveryFailed(String),

    #[error("this is a system command, must be admin user to execute")]
    PermissionDenied,

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    InvalidArgument(&'static str),

    #[error("server is shutting down")]
    ShuttingDown,

    #[error(transparent)]
    Store(#[from] DbError),
}

impl ChatError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DuplicateNickname(_) => "duplicate_nickname",
            Self::IllegalNickname(_) => "illegal_nickname",
            Self::DeliveryFailed(_) => "delivery_failed",
            Self::PermissionDenied => "permission_denied",
            Self::NotFound(_) => "not_found",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::ShuttingDown => "shutting_down",
            Self::Store(_) => "store_error",
        }
    }

    /// Convert to the line shown to the issuing session.
    ///
    /// Returns `None` for errors that don't warrant a client-visible reply
    /// (the session is already gone when delivery fails).
    pub fn to_reply(&self) -> Option<String> {
        match self {
            Self::DuplicateNickname(_) => {
                Some("That nickname is already in use. Please choose another.".to_string())
            }
            Self::NotFound(_) => Some("User not found.".to_string()),
            Self::DeliveryFailed(_) => None,
            other => Some(other.to_string()),
        }
    }
}

/// Result type for command handlers.
pub type HandlerResult = Result<(), ChatError>;

// ============================================================================
// Login Errors (per-connection state machine)
// ============================================================================

/// Terminal outcomes of the login state machine. Each one closes the connection.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("login period exceeded")]
    Timeout,

    #[error("login attempts exhausted")]
    AttemptsExhausted,

    #[error("connection closed during login")]
    Disconnected,

    #[error("I/O error during login: {0}")]
    Io(String),

    #[error("server is shutting down")]
    ShuttingDown,
}

impl LoginError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::AttemptsExhausted => "attempts_exhausted",
            Self::Disconnected => "disconnected",
            Self::Io(_) => "io_error",
            Self::ShuttingDown => "shutting_down",
        }
    }

    /// The single line sent to the client before the connection is closed.
    pub fn farewell(&self) -> Option<&'static str> {
        match self {
            Self::Timeout => Some("Login period exceeded, connection closed."),
            Self::AttemptsExhausted => Some("Login attempts exhausted, closing connection."),
            Self::ShuttingDown => Some("Server is shutting down. Please reconnect later."),
            Self::Disconnected | Self::Io(_) => None,
        }
    }
}
