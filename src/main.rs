//! slchatd - Straylight Chat Daemon
//!
//! Loads the configuration, opens the account store and runs the chat server
//! until a shutdown completes.

use slchatd::config::{Config, validate};
use slchatd::db::Database;
use slchatd::handlers::{Command, CommandSender};
use slchatd::state::ShutdownController;
use slchatd::{Server, metrics, telemetry};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_logging();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        return Err(anyhow::anyhow!(
            "configuration has {} error(s), see log",
            errors.len()
        ));
    }

    info!(
        server = %config.server.name,
        address = %config.listen.address,
        "Starting slchatd"
    );

    if config.server.metrics_port != 0 {
        metrics::init();
    }

    // Initialize database
    let db = Database::new(&config.database.path, config.database.hash_cost()).await?;
    if db.ensure_admin(&config.database.bootstrap_admin_password).await? {
        warn!(
            "Created bootstrap admin account 'admin' with the configured password; change it with /passwd"
        );
    }

    let server = Server::bind(&config, Arc::new(db)).await?;
    info!(addr = %server.local_addr()?, "Listening");

    tokio::spawn(forward_signals(
        server.command_sender(),
        server.matrix().shutdown.clone(),
    ));

    server.run().await
}

/// Turn SIGINT/SIGTERM into an immediate shutdown command.
///
/// Once the dispatcher has stopped (a countdown is running) the queue is
/// closed, so the controller is asked directly.
async fn forward_signals(commands: CommandSender, shutdown: Arc<ShutdownController>) {
    loop {
        if let Err(e) = wait_for_signal().await {
            error!(error = %e, "Failed to listen for shutdown signals");
            return;
        }

        if commands.send(Command::system_shutdown()).await.is_err() {
            info!("Command dispatcher stopped, terminating directly");
            shutdown.request(0).await;
            return;
        }
    }
}

/// Wait for SIGTERM or SIGINT.
async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
        Ok(())
    }
}
