//! Chat command handlers.
//!
//! Each command is a unit struct implementing [`Handler`]; the
//! [`Dispatcher`] maps names to handlers and runs them one at a time.

mod account;
pub mod core;
mod messaging;
mod oper;
mod server_query;
mod user;

pub use self::core::{
    Access, COMMAND_MARKER, Command, CommandReceiver, CommandSender, Context, Dispatcher, Handler,
    Issuer, command_queue,
};
pub use oper::kick;
