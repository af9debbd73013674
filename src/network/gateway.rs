//! Gateway - TCP listener that accepts incoming connections.
//!
//! The Gateway binds the chat socket and spawns a Connection task for each
//! incoming client until the shutdown controller closes the listener.

use crate::handlers::CommandSender;
use crate::network::Connection;
use crate::state::Matrix;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, instrument};

/// The Gateway accepts incoming TCP connections and spawns handlers.
pub struct Gateway {
    listener: TcpListener,
    matrix: Arc<Matrix>,
    commands: CommandSender,
}

impl Gateway {
    /// Bind the gateway to the specified address.
    pub async fn bind(
        addr: SocketAddr,
        matrix: Arc<Matrix>,
        commands: CommandSender,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "Listener bound");
        Ok(Self {
            listener,
            matrix,
            commands,
        })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until shutdown closes the listener.
    ///
    /// An accept error is logged and stops this loop only; sessions already
    /// running are unaffected.
    #[instrument(skip(self), name = "gateway")]
    pub async fn run(self) {
        let stop = self.matrix.shutdown.listener_closed();

        loop {
            let accepted = tokio::select! {
                biased;
                _ = stop.cancelled() => {
                    info!("Stopped accepting new connections");
                    break;
                }
                res = self.listener.accept() => res,
            };

            match accepted {
                Ok((stream, addr)) => {
                    crate::metrics::record_connection_accepted();
                    info!(%addr, "Connection accepted");

                    let connection = Connection::new(
                        stream,
                        addr,
                        Arc::clone(&self.matrix),
                        self.commands.clone(),
                    );
                    tokio::spawn(async move {
                        if let Err(e) = connection.run().await {
                            error!(%addr, error = %e, "Connection error");
                        }
                        info!(%addr, "Connection closed");
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection, acceptor stopping");
                    break;
                }
            }
        }
    }
}
