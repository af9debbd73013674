//! Test server management.
//!
//! Runs a chat server in-process on an ephemeral port with an in-memory
//! account store and cheap password hashing.

use super::client::TestClient;
use slchatd::Server;
use slchatd::config::Config;
use slchatd::db::{CredentialStore, Database, HashCost, Privilege};
use slchatd::handlers::{Command, CommandSender};
use slchatd::state::Matrix;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Password of the bootstrap `admin` account.
pub const ADMIN_PASSWORD: &str = "rootpw";

/// Regular accounts every test server starts with.
pub const USERS: &[(&str, &str)] = &[("alice", "alicepw"), ("bob", "bobpw"), ("carol", "carolpw")];

/// Cost parameters small enough for tests.
pub const TEST_HASH_COST: HashCost = HashCost {
    memory_kib: 64,
    iterations: 1,
};

/// A test server instance.
pub struct TestServer {
    addr: SocketAddr,
    matrix: Arc<Matrix>,
    commands: CommandSender,
    db: Arc<Database>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    /// Spawn a server with test defaults.
    pub async fn spawn() -> anyhow::Result<Self> {
        Self::spawn_with(|_| {}).await
    }

    /// Spawn a server after letting the caller adjust the configuration.
    pub async fn spawn_with(tweak: impl FnOnce(&mut Config)) -> anyhow::Result<Self> {
        let mut config = Config::with_listen("127.0.0.1:0".parse()?);
        config.presentation.color = false;
        config.login.timeout_secs = 10;
        config.shutdown.drain_timeout_secs = 2;
        tweak(&mut config);

        let db = Arc::new(Database::new(":memory:", TEST_HASH_COST).await?);
        db.ensure_admin(ADMIN_PASSWORD).await?;
        for (username, password) in USERS {
            db.create_account(username, password, Privilege::User).await?;
        }

        let server = Server::bind(&config, db.clone()).await?;
        let addr = server.local_addr()?;
        let matrix = server.matrix();
        let commands = server.command_sender();
        let handle = tokio::spawn(server.run());

        Ok(Self {
            addr,
            matrix,
            commands,
            db,
            handle,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn matrix(&self) -> &Arc<Matrix> {
        &self.matrix
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    /// Open a connection without logging in.
    pub async fn connect(&self) -> anyhow::Result<TestClient> {
        TestClient::connect(self.addr).await
    }

    /// Connect and log in; the session is registered when this returns.
    pub async fn login(&self, username: &str, password: &str) -> anyhow::Result<TestClient> {
        let mut client = self.connect().await?;
        client.login(username, password).await?;
        Ok(client)
    }

    /// Inject an immediate shutdown the way a signal would.
    pub async fn signal_shutdown(&self) -> anyhow::Result<()> {
        self.commands
            .send(Command::system_shutdown())
            .await
            .map_err(|_| anyhow::anyhow!("command queue closed"))
    }

    /// Wait for the server task to finish.
    pub async fn join(self) -> anyhow::Result<()> {
        self.handle.await?
    }
}
