//! Post-login event loop.
//!
//! Chat lines are broadcast straight from this task; `/` lines go to the
//! command queue. Writes come only from the session's outbound queue.

use super::{Connection, Registered};
use crate::network::codec::Frame;
use crate::handlers::{Command, Issuer};
use futures_util::{SinkExt, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub(super) const LINE_TOO_LONG: &str = "Input line too long.";

/// What to do after handling one input line.
enum Flow {
    Continue,
    Stop,
}

impl Connection {
    /// Serve a registered session until it leaves, fails or is closed.
    pub(super) async fn serve(&mut self, registered: Registered) -> anyhow::Result<()> {
        let Registered {
            session,
            mut outbound,
            closer,
        } = registered;

        loop {
            tokio::select! {
                biased;

                _ = closer.cancelled() => {
                    // Kicked, logged out or shutting down: deliver what's queued.
                    while let Ok(line) = outbound.try_recv() {
                        if self.writer.feed(line).await.is_err() {
                            break;
                        }
                    }
                    let _ = self.writer.flush().await;
                    break;
                }

                Some(line) = outbound.recv() => {
                    if let Err(e) = self.writer.send(line).await {
                        debug!(error = %e, "Write failed");
                        break;
                    }
                }

                frame = self.reader.next() => match frame {
                    Some(Ok(Frame::Line(line))) => {
                        if let Flow::Stop = self.route(line, &closer).await {
                            break;
                        }
                    }
                    Some(Ok(Frame::TooLong)) => {
                        // The codec drops the rest of the line; the session stays.
                        warn!("Input line too long, discarding");
                        if let Err(e) = self.writer.send(LINE_TOO_LONG.to_string()).await {
                            debug!(error = %e, "Write failed");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "Read failed");
                        break;
                    }
                    None => {
                        debug!("Client closed the connection");
                        break;
                    }
                },
            }
        }

        // No-op when a command or a failed send already removed us.
        if let Some(gone) = self.matrix.registry.remove_session(session.id()) {
            info!(nick = %gone.nickname, "Session unregistered");
        }
        drop(session);
        drop(outbound);
        let _ = self.writer.close().await;
        Ok(())
    }

    /// Route one input line: ignore blanks, queue commands, broadcast chat.
    async fn route(&mut self, line: String, closer: &CancellationToken) -> Flow {
        let text = line.trim();
        if text.is_empty() {
            return Flow::Continue;
        }

        if Command::is_command_line(text) {
            let cmd = Command::parse(Issuer::Session(self.id), text);
            tokio::select! {
                biased;
                _ = closer.cancelled() => {}
                res = self.commands.send(cmd) => {
                    if res.is_err() {
                        debug!("Command queue closed, dropping command");
                    }
                }
            }
            return Flow::Continue;
        }

        // The nickname can change under us; read it at send time.
        let Some(me) = self.matrix.registry.profile(self.id) else {
            return Flow::Stop;
        };
        self.matrix
            .registry
            .broadcast_line(format!("{}: {text}", me.nickname));
        Flow::Continue
    }
}
