//! Command handler context and core types.
//!
//! Defines the `Context<'a>` passed to every handler and the `Handler` trait.

use super::command::Issuer;
use crate::error::{ChatError, HandlerResult};
use crate::state::{Matrix, Profile};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// A command handler.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &mut Context<'_>) -> HandlerResult;
}

/// Handler context passed to each command handler.
pub struct Context<'a> {
    /// Shared server state.
    pub matrix: &'a Arc<Matrix>,
    /// Who issued the command.
    pub issuer: Issuer,
    /// Issuer's registry entry as of dispatch. `None` for the system issuer.
    pub profile: Option<Profile>,
    /// Command arguments.
    pub args: &'a [String],
    halt: bool,
}

impl<'a> Context<'a> {
    pub fn new(
        matrix: &'a Arc<Matrix>,
        issuer: Issuer,
        profile: Option<Profile>,
        args: &'a [String],
    ) -> Self {
        Self {
            matrix,
            issuer,
            profile,
            args,
            halt: false,
        }
    }

    /// The issuing session's profile.
    pub fn me(&self) -> Result<&Profile, ChatError> {
        self.profile.as_ref().ok_or(ChatError::PermissionDenied)
    }

    /// Issuer nickname for messages and logs.
    pub fn nickname(&self) -> &str {
        self.profile
            .as_ref()
            .map(|p| p.nickname.as_str())
            .unwrap_or("system")
    }

    /// Admin sessions and the system issuer pass privilege checks.
    pub fn is_admin(&self) -> bool {
        match &self.profile {
            Some(p) => p.is_admin(),
            None => self.issuer == Issuer::System,
        }
    }

    /// Send one line back to the issuer. System replies go to the log.
    pub fn reply(&self, line: impl Into<String>) -> HandlerResult {
        let line = line.into();
        match &self.profile {
            Some(p) => self.matrix.registry.send_line(p.id(), line),
            None => {
                info!(reply = %line, "System command reply");
                Ok(())
            }
        }
    }

    /// Send several lines back to the issuer.
    pub fn reply_lines(&self, lines: &[String]) -> HandlerResult {
        match &self.profile {
            Some(p) => self.matrix.registry.send_to(p.id(), lines),
            None => {
                for line in lines {
                    info!(reply = %line, "System command reply");
                }
                Ok(())
            }
        }
    }

    /// Arguments from `from` onward joined by single spaces.
    pub fn rest(&self, from: usize) -> String {
        self.args.get(from..).map(|a| a.join(" ")).unwrap_or_default()
    }

    /// Stop the dispatcher after this command returns.
    pub fn halt_dispatcher(&mut self) {
        self.halt = true;
    }

    pub fn halted(&self) -> bool {
        self.halt
    }
}
