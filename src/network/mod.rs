//! Network module.
//!
//! Contains the Gateway (TCP listener) and the per-client Connection task.

mod codec;
mod connection;
mod gateway;

pub use codec::{ChatCodec, Frame};
pub use connection::Connection;
pub use gateway::Gateway;
