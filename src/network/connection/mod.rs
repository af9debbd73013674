//! Connection - Handles an individual client connection.
//!
//! Each Connection runs in its own Tokio task:
//!
//! ```text
//! Phase 1: Login (sequential prompts, one deadline for the whole phase)
//!    ↓
//! Phase 2: Event loop (tokio::select!)
//!    ┌────────────────────────────────────────────────────┐
//!    │  closer token ──▶ flush queued lines, close        │
//!    │  outbound queue ──▶ FramedWrite                    │
//!    │  FramedRead ──▶ chat broadcast | command queue     │
//!    └────────────────────────────────────────────────────┘
//! ```
//!
//! Other tasks never touch the socket: they push lines into the session's
//! outbound queue and cancel its closer token.

mod event_loop;
mod handshake;

use super::codec::ChatCodec;
use crate::handlers::CommandSender;
use crate::state::{Matrix, Session, SessionId, next_session_id};
use futures_util::SinkExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

type LineReader = FramedRead<OwnedReadHalf, ChatCodec>;
type LineWriter = FramedWrite<OwnedWriteHalf, ChatCodec>;

/// What a successful login hands to the event loop.
pub(super) struct Registered {
    pub session: Arc<Session>,
    pub outbound: mpsc::Receiver<String>,
    pub closer: CancellationToken,
}

/// A client connection handler.
pub struct Connection {
    id: SessionId,
    addr: SocketAddr,
    matrix: Arc<Matrix>,
    commands: CommandSender,
    reader: LineReader,
    writer: LineWriter,
}

impl Connection {
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        matrix: Arc<Matrix>,
        commands: CommandSender,
    ) -> Self {
        let (read_half, write_half) = stream.into_split();
        let max_line = matrix.config.max_line_length;
        Self {
            id: next_session_id(),
            addr,
            matrix,
            commands,
            reader: FramedRead::new(read_half, ChatCodec::new(max_line)),
            writer: FramedWrite::new(write_half, ChatCodec::new(max_line)),
        }
    }

    /// Run login, then the event loop, until the client leaves or is closed.
    #[instrument(skip(self), fields(session = self.id, addr = %self.addr), name = "connection")]
    pub async fn run(mut self) -> anyhow::Result<()> {
        let registered = match self.login().await {
            Ok(registered) => registered,
            Err(e) => {
                crate::metrics::record_login_failure(e.error_code());
                info!(reason = e.error_code(), "Login failed");
                if let Some(farewell) = e.farewell() {
                    let _ = self.writer.send(farewell.to_string()).await;
                }
                let _ = self.writer.close().await;
                return Ok(());
            }
        };

        self.serve(registered).await
    }
}
