//! Core handler infrastructure.
//!
//! Parsed commands, the per-command context handed to each handler, and the
//! dispatcher that serializes command execution.

pub mod command;
pub mod context;
pub mod dispatcher;

pub use command::{COMMAND_MARKER, Command, Issuer};
pub use context::{Context, Handler};
pub use dispatcher::{Access, CommandReceiver, CommandSender, Dispatcher, command_queue};
