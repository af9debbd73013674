//! Server assembly: shared state, command queue, acceptor and dispatcher.

use crate::config::Config;
use crate::db::CredentialStore;
use crate::handlers::{CommandReceiver, CommandSender, Dispatcher, command_queue};
use crate::network::Gateway;
use crate::state::Matrix;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

/// A bound, not yet running chat server.
pub struct Server {
    matrix: Arc<Matrix>,
    gateway: Gateway,
    commands: CommandSender,
    queue: CommandReceiver,
    metrics_port: u16,
}

impl Server {
    /// Build the shared state and bind the listening socket.
    ///
    /// Failing to bind is fatal to startup.
    pub async fn bind(config: &Config, store: Arc<dyn CredentialStore>) -> anyhow::Result<Self> {
        let matrix = Arc::new(Matrix::new(config, store));
        let (commands, queue) = command_queue(config.server.command_queue);
        let gateway =
            Gateway::bind(config.listen.address, Arc::clone(&matrix), commands.clone()).await?;

        Ok(Self {
            matrix,
            gateway,
            commands,
            queue,
            metrics_port: config.server.metrics_port,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.gateway.local_addr()
    }

    pub fn matrix(&self) -> Arc<Matrix> {
        Arc::clone(&self.matrix)
    }

    /// Sender for injecting commands (signal handling uses this).
    pub fn command_sender(&self) -> CommandSender {
        self.commands.clone()
    }

    /// Run until the shutdown sequence has finished.
    pub async fn run(self) -> anyhow::Result<()> {
        let Self {
            matrix,
            gateway,
            commands,
            queue,
            metrics_port,
        } = self;
        // Connections hold their own senders.
        drop(commands);

        let dispatcher = Dispatcher::new(Arc::clone(&matrix));
        let worker = tokio::spawn(dispatcher.run(queue));

        if metrics_port != 0 {
            let stop = matrix.shutdown.terminated();
            tokio::spawn(crate::http::run_http_server(metrics_port, stop));
            info!(port = metrics_port, "Prometheus HTTP server started");
        }

        info!(server = %matrix.server_info.name, "Server running");
        gateway.run().await;

        matrix.shutdown.terminated().cancelled().await;
        if let Err(e) = worker.await {
            error!(error = %e, "Command dispatcher task failed");
        }
        info!("Server stopped");
        Ok(())
    }
}
