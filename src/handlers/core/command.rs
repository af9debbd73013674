//! Parsed commands.

use crate::state::SessionId;
use std::fmt;

/// Marker that starts a command line.
pub const COMMAND_MARKER: char = '/';

/// Who a command runs on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Issuer {
    /// A registered session.
    Session(SessionId),
    /// The process itself (signal handling).
    System,
}

impl fmt::Display for Issuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session(id) => write!(f, "session:{id}"),
            Self::System => f.write_str("system"),
        }
    }
}

/// One command line, split into name and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub issuer: Issuer,
    pub args: Vec<String>,
}

impl Command {
    /// Parse a `/`-prefixed line. A bare `/` yields an empty name.
    pub fn parse(issuer: Issuer, line: &str) -> Self {
        let body = line.trim();
        let body = body.strip_prefix(COMMAND_MARKER).unwrap_or(body);
        let mut parts = body.split_whitespace();
        let name = parts.next().unwrap_or_default().to_string();
        let args = parts.map(str::to_string).collect();
        Self { name, issuer, args }
    }

    /// Immediate shutdown on behalf of the process.
    pub fn system_shutdown() -> Self {
        Self {
            name: "shutdown".to_string(),
            issuer: Issuer::System,
            args: vec!["0".to_string()],
        }
    }

    /// Whether the line should be handed to the dispatcher.
    pub fn is_command_line(line: &str) -> bool {
        line.starts_with(COMMAND_MARKER)
    }
}
