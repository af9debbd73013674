//! Login state machine.
//!
//! AwaitingUsername -> AwaitingPassword -> ResolvingNickname -> Authenticated.
//! Every read shares one deadline taken at entry, and each failed
//! authentication consumes one of the configured attempts.

use super::event_loop::LINE_TOO_LONG;
use super::{Connection, Registered};
use crate::network::codec::Frame;
use crate::db::{DbError, Privilege};
use crate::error::{ChatError, ERR_ILLEGAL_NICKNAME, LoginError};
use crate::state::{Session, nick};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

const USERNAME_PROMPT: &str = "Please enter your username: ";
const PASSWORD_PROMPT: &str = "Please enter your password: ";
const AUTH_FAILED: &str = "Invalid username or password. Please try again.";
const NICK_IN_USE_PROMPT: &str = "Username already in use. Please enter a different nickname: ";

impl Connection {
    /// Authenticate the client and register it under a unique nickname.
    pub(super) async fn login(&mut self) -> Result<Registered, LoginError> {
        let deadline = Instant::now() + self.matrix.config.login.timeout();
        let max_attempts = self.matrix.config.login.max_attempts;

        self.prompt(&format!(
            "Welcome to {}. {USERNAME_PROMPT}",
            self.matrix.server_info.name
        ))
        .await?;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                self.prompt(USERNAME_PROMPT).await?;
            }

            let username = nick::sanitize(&self.read_line(deadline).await?);
            self.prompt(PASSWORD_PROMPT).await?;
            let password = self.read_line(deadline).await?.trim().to_string();

            // Malformed usernames can't name an account; fail them like a bad password.
            if nick::validate(&username).is_err() {
                debug!(attempt, "Login with malformed username");
                self.prompt(AUTH_FAILED).await?;
                continue;
            }

            match self.matrix.store.authenticate(&username, &password).await {
                Ok(account) => {
                    info!(username = %account.username, attempt, "Authenticated");
                    return self
                        .register(account.username, account.privilege, deadline)
                        .await;
                }
                Err(DbError::AccountNotFound(_) | DbError::InvalidPassword) => {
                    debug!(username = %username, attempt, "Authentication failed");
                }
                Err(e) => {
                    error!(username = %username, error = %e, "Credential store error during login");
                }
            }
            self.prompt(AUTH_FAILED).await?;
        }

        Err(LoginError::AttemptsExhausted)
    }

    /// Insert the session into the registry, asking for another nickname
    /// while the current one is taken.
    async fn register(
        &mut self,
        username: String,
        privilege: Privilege,
        deadline: Instant,
    ) -> Result<Registered, LoginError> {
        let (tx, outbound) = mpsc::channel(self.matrix.config.outbound_queue);
        let closer = CancellationToken::new();
        let session = Arc::new(Session::new(
            self.id,
            username.clone(),
            self.addr,
            tx,
            closer.clone(),
        ));

        let registry = Arc::clone(&self.matrix.registry);
        let mut nickname = username;
        loop {
            match registry.add(Arc::clone(&session), &nickname, privilege) {
                Ok(()) => break,
                Err(ChatError::DuplicateNickname(_)) => {
                    self.prompt(NICK_IN_USE_PROMPT).await?;
                    loop {
                        let candidate = nick::sanitize(&self.read_line(deadline).await?);
                        if nick::validate(&candidate).is_ok() {
                            nickname = candidate;
                            break;
                        }
                        self.prompt(ERR_ILLEGAL_NICKNAME).await?;
                    }
                }
                Err(ChatError::ShuttingDown) => return Err(LoginError::ShuttingDown),
                Err(e) => return Err(LoginError::Io(e.to_string())),
            }
        }

        // Written ahead of anything already queued for this session.
        let welcome = format!(
            "Welcome to {}! You are now known as {nickname}.",
            self.matrix.server_info.name
        );
        if let Err(e) = self.writer.send(welcome).await {
            registry.remove_session(self.id);
            return Err(LoginError::Io(e.to_string()));
        }
        info!(nick = %nickname, "Session registered");
        registry.broadcast_line(format!("{nickname} has joined the chat"));

        Ok(Registered {
            session,
            outbound,
            closer,
        })
    }

    /// Read one line before `deadline`, giving up if the server starts
    /// shutting down. Over-long lines are refused and the read retried.
    async fn read_line(&mut self, deadline: Instant) -> Result<String, LoginError> {
        let stop = self.matrix.shutdown.listener_closed();
        loop {
            let frame = tokio::select! {
                biased;
                _ = stop.cancelled() => return Err(LoginError::ShuttingDown),
                res = timeout_at(deadline, self.reader.next()) => match res {
                    Err(_) => return Err(LoginError::Timeout),
                    Ok(None) => return Err(LoginError::Disconnected),
                    Ok(Some(Err(e))) => return Err(LoginError::Io(e.to_string())),
                    Ok(Some(Ok(frame))) => frame,
                },
            };
            match frame {
                Frame::Line(line) => return Ok(line),
                Frame::TooLong => self.prompt(LINE_TOO_LONG).await?,
            }
        }
    }

    async fn prompt(&mut self, line: &str) -> Result<(), LoginError> {
        self.writer
            .send(line.to_string())
            .await
            .map_err(|e| LoginError::Io(e.to_string()))
    }
}
