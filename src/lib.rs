//! slchatd - Straylight Chat Daemon
//!
//! A line-oriented multi-user chat server: password login, public chat,
//! private messages, and a serialized command dispatcher for user and
//! admin commands, with a graceful countdown shutdown.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod http;
pub mod markup;
pub mod metrics;
pub mod network;
pub mod server;
pub mod state;
pub mod telemetry;

pub use server::Server;
