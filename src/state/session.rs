//! Live session handle.
//!
//! A `Session` is the shareable half of a connection: its identity, the
//! queue feeding its writer and a token that asks the connection task to
//! close. The socket itself stays owned by the connection task.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

/// Process-unique session identifier.
pub type SessionId = u64;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a fresh session id.
pub fn next_session_id() -> SessionId {
    NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)
}

/// Handle to one authenticated connection.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    username: String,
    addr: SocketAddr,
    outbound: mpsc::Sender<String>,
    closer: CancellationToken,
}

impl Session {
    pub fn new(
        id: SessionId,
        username: impl Into<String>,
        addr: SocketAddr,
        outbound: mpsc::Sender<String>,
        closer: CancellationToken,
    ) -> Self {
        Self {
            id,
            username: username.into(),
            addr,
            outbound,
            closer,
        }
    }

    #[inline]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Account name used at login. Never changes.
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Queue one line for the writer without waiting.
    ///
    /// Fails when the queue is full or the connection is gone.
    pub(crate) fn try_deliver(&self, line: String) -> Result<(), TrySendError<String>> {
        self.outbound.try_send(line)
    }

    /// Ask the connection task to flush what is queued and close.
    pub fn close(&self) {
        self.closer.cancel();
    }

    pub fn is_closing(&self) -> bool {
        self.closer.is_cancelled()
    }

    /// Resolves once the connection task has dropped its outbound queue.
    pub async fn closed(&self) {
        self.outbound.closed().await;
    }
}
