//! State management module.
//!
//! Contains the Matrix (shared server state), the session registry and
//! messaging, nickname rules, and the shutdown controller.

mod lifecycle;
mod matrix;
mod messaging;
pub mod nick;
pub(crate) mod registry;
mod session;

pub use lifecycle::{ShutdownController, ShutdownPhase, countdown_notice};
pub use matrix::{Matrix, MatrixConfig, ServerInfo};
pub use messaging::WhisperKind;
pub use registry::{Profile, Registry};
pub use session::{Session, SessionId, next_session_id};
