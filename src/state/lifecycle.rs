//! Graceful shutdown.
//!
//! The `ShutdownController` walks the process through
//! Idle -> CountingDown -> Terminating. Termination broadcasts a final notice,
//! closes the listener and the command queue, then asks every live session to
//! close and waits for them up to a grace period.

use super::registry::Registry;
use futures_util::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const MINUTE: u64 = 60;
const QUARTER_HOUR: u64 = 15 * MINUTE;

/// Process-wide shutdown state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    Idle,
    CountingDown,
    Terminating,
}

/// Warning due when `remaining` seconds are left, if any.
///
/// Every 15 minutes above a quarter hour, every minute down to one minute,
/// then every 10 seconds. Nothing at zero; the final notice covers it.
pub fn countdown_notice(remaining: u64) -> Option<String> {
    match remaining {
        0 => None,
        r if r > QUARTER_HOUR => (r % QUARTER_HOUR == 0)
            .then(|| format!("System Notice: SHUTDOWN in {} minutes", r / MINUTE)),
        r if r > MINUTE => (r % MINUTE == 0).then(|| {
            format!(
                "System Notice: SHUTDOWN in {} minutes. Please log out now.",
                r / MINUTE
            )
        }),
        r => (r % 10 == 0)
            .then(|| format!("System Notice: SHUTDOWN IMMINENT in {r} seconds. LOG OUT NOW!")),
    }
}

/// Drives the shutdown sequence.
pub struct ShutdownController {
    registry: Arc<Registry>,
    server_name: String,
    phase: Mutex<ShutdownPhase>,
    drain_timeout: Duration,
    /// Stops the acceptor.
    listener_closed: CancellationToken,
    /// Stops the command dispatcher.
    queue_closed: CancellationToken,
    /// Cancels a running countdown.
    supersede: CancellationToken,
    /// Fired once the drain has finished or timed out.
    terminated: CancellationToken,
}

impl ShutdownController {
    pub fn new(registry: Arc<Registry>, server_name: impl Into<String>, drain_timeout: Duration) -> Self {
        Self {
            registry,
            server_name: server_name.into(),
            phase: Mutex::new(ShutdownPhase::Idle),
            drain_timeout,
            listener_closed: CancellationToken::new(),
            queue_closed: CancellationToken::new(),
            supersede: CancellationToken::new(),
            terminated: CancellationToken::new(),
        }
    }

    pub fn phase(&self) -> ShutdownPhase {
        *self.phase.lock()
    }

    pub fn is_terminating(&self) -> bool {
        self.phase() == ShutdownPhase::Terminating
    }

    pub fn listener_closed(&self) -> CancellationToken {
        self.listener_closed.clone()
    }

    pub fn queue_closed(&self) -> CancellationToken {
        self.queue_closed.clone()
    }

    pub fn terminated(&self) -> CancellationToken {
        self.terminated.clone()
    }

    /// Request shutdown in `delay_secs` seconds; zero means now.
    ///
    /// A positive delay starts the countdown and returns. Zero runs the
    /// termination sequence to completion, superseding any countdown.
    pub async fn request(self: &Arc<Self>, delay_secs: u64) {
        if delay_secs == 0 {
            self.terminate().await;
            return;
        }

        {
            let mut phase = self.phase.lock();
            if *phase != ShutdownPhase::Idle {
                debug!(phase = ?*phase, "Shutdown already in progress, ignoring countdown request");
                return;
            }
            *phase = ShutdownPhase::CountingDown;
        }

        let msg = format!(
            "{} shutdown has been initiated; server will shut down in {} minutes, {} seconds.",
            self.server_name,
            delay_secs / MINUTE,
            delay_secs % MINUTE
        );
        info!(delay_secs, "{}", msg);
        self.registry.broadcast_sys(&msg);

        tokio::spawn(Arc::clone(self).countdown(delay_secs));
    }

    async fn countdown(self: Arc<Self>, mut remaining: u64) {
        let tick = Duration::from_secs(1);
        let mut ticker = interval_at(Instant::now() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while remaining > 0 {
            tokio::select! {
                _ = self.supersede.cancelled() => {
                    debug!(remaining, "Countdown superseded");
                    return;
                }
                _ = ticker.tick() => {
                    remaining -= 1;
                    if let Some(notice) = countdown_notice(remaining) {
                        self.registry.broadcast_sys(&notice);
                    }
                }
            }
        }

        self.terminate().await;
    }

    /// Run the termination sequence once. Later callers return immediately.
    async fn terminate(&self) {
        {
            let mut phase = self.phase.lock();
            if *phase == ShutdownPhase::Terminating {
                return;
            }
            *phase = ShutdownPhase::Terminating;
        }
        self.supersede.cancel();

        let notice = format!(
            "System Notice: {} is shutting down NOW. Please reconnect later.",
            self.server_name
        );
        info!("{}", notice);
        self.registry.broadcast_sys(&notice);

        self.listener_closed.cancel();
        self.queue_closed.cancel();

        let sessions = self.registry.close();
        for session in &sessions {
            session.close();
        }

        let drain = join_all(sessions.iter().map(|s| s.closed()));
        match tokio::time::timeout(self.drain_timeout, drain).await {
            Ok(_) => info!(count = sessions.len(), "All connections closed gracefully"),
            Err(_) => warn!(
                timeout = ?self.drain_timeout,
                "Timeout waiting for connections to close, forcing shutdown"
            ),
        }

        self.terminated.cancel();
    }
}
