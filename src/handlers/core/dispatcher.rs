//! Command dispatcher.
//!
//! A single task drains one FIFO queue and runs each command to completion
//! before taking the next, so commands never execute concurrently. Handlers
//! are looked up by name; admin-only entries share one privilege gate.

use super::command::{Command, Issuer};
use super::context::{Context, Handler};
use crate::error::{ChatError, ERR_PRIVILEGE};
use crate::handlers::{
    account::{CreateUserHandler, DeleteUserHandler, EnumUsersHandler, PasswdHandler, PrivHandler},
    messaging::{MsgHandler, ReplyHandler},
    oper::{KickHandler, ShutdownHandler},
    server_query::HelpHandler,
    user::{ByeHandler, EchoHandler, NickHandler, WhoHandler, WhoamiHandler},
};
use crate::state::Matrix;
use crate::telemetry::{CommandTimer, spans};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, warn};

/// Sending half of the command queue.
pub type CommandSender = mpsc::Sender<Command>;

/// Receiving half of the command queue.
pub type CommandReceiver = mpsc::Receiver<Command>;

/// Create the bounded command queue.
pub fn command_queue(depth: usize) -> (CommandSender, CommandReceiver) {
    mpsc::channel(depth)
}

/// Who may run a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Anyone,
    Admin,
}

struct Entry {
    handler: Box<dyn Handler>,
    access: Access,
}

/// Name -> handler table plus the queue worker.
pub struct Dispatcher {
    matrix: Arc<Matrix>,
    handlers: HashMap<&'static str, Entry>,
}

impl Dispatcher {
    /// Create a dispatcher with all handlers registered.
    pub fn new(matrix: Arc<Matrix>) -> Self {
        let mut d = Self {
            matrix,
            handlers: HashMap::new(),
        };

        d.register("help", Access::Anyone, HelpHandler);
        d.register("whoami", Access::Anyone, WhoamiHandler);
        d.register("echo", Access::Anyone, EchoHandler);
        d.register("who", Access::Anyone, WhoHandler);
        d.register("nick", Access::Anyone, NickHandler);
        d.register("bye", Access::Anyone, ByeHandler);
        d.register("logout", Access::Anyone, ByeHandler);

        // Private messages
        d.register("msg", Access::Anyone, MsgHandler);
        d.register("w", Access::Anyone, MsgHandler);
        d.register("whisper", Access::Anyone, MsgHandler);
        d.register("r", Access::Anyone, ReplyHandler);
        d.register("reply", Access::Anyone, ReplyHandler);

        // Accounts; passwd checks ownership itself
        d.register("passwd", Access::Anyone, PasswdHandler);
        d.register("createuser", Access::Admin, CreateUserHandler);
        d.register("deleteuser", Access::Admin, DeleteUserHandler);
        d.register("priv", Access::Admin, PrivHandler);
        d.register("enumusers", Access::Admin, EnumUsersHandler);

        // Operator
        d.register("kick", Access::Admin, KickHandler);
        d.register("shutdown", Access::Admin, ShutdownHandler);

        d
    }

    fn register(&mut self, name: &'static str, access: Access, handler: impl Handler + 'static) {
        self.handlers.insert(
            name,
            Entry {
                handler: Box::new(handler),
                access,
            },
        );
    }

    /// Registered command names, sorted.
    pub fn command_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Drain the queue until it closes, shutdown closes it, or a command halts
    /// the dispatcher.
    pub async fn run(self, mut rx: CommandReceiver) {
        let queue_closed = self.matrix.shutdown.queue_closed();
        info!("Command dispatcher started");

        loop {
            let cmd = tokio::select! {
                biased;
                _ = queue_closed.cancelled() => break,
                cmd = rx.recv() => match cmd {
                    Some(cmd) => cmd,
                    None => break,
                },
            };

            if self.dispatch(cmd).await {
                break;
            }
        }

        info!("Command dispatcher stopped");
    }

    /// Run one command. Returns `true` when the dispatcher should stop.
    pub async fn dispatch(&self, cmd: Command) -> bool {
        if cmd.name.is_empty() {
            return false;
        }

        let profile = match cmd.issuer {
            Issuer::Session(id) => match self.matrix.registry.profile(id) {
                Some(p) => Some(p),
                None => {
                    // Logged out or kicked while the command was queued.
                    debug!(issuer = %cmd.issuer, command = %cmd.name, "Dropping command from departed session");
                    return false;
                }
            },
            Issuer::System => None,
        };

        let name = cmd.name.to_ascii_lowercase();
        let mut ctx = Context::new(&self.matrix, cmd.issuer, profile, &cmd.args);

        let Some(entry) = self.handlers.get(name.as_str()) else {
            info!(nick = %ctx.nickname(), command = %cmd.name, "Unknown command");
            crate::metrics::record_command_error("unknown", "unknown_command");
            let _ = ctx.reply("Unknown command.");
            return false;
        };

        if cmd.issuer == Issuer::System && name != "shutdown" {
            warn!(command = %name, "System issuer may only request shutdown");
            return false;
        }

        if entry.access == Access::Admin && !ctx.is_admin() {
            crate::metrics::record_command_error(&name, ChatError::PermissionDenied.error_code());
            let _ = ctx.reply(ERR_PRIVILEGE);
            return false;
        }

        let span = spans::command(&name, ctx.nickname());
        let _timer = CommandTimer::new(name.as_str());

        let result = entry.handler.handle(&mut ctx).instrument(span).await;

        if let Err(e) = result {
            crate::metrics::record_command_error(&name, e.error_code());
            debug!(command = %name, error = %e, "Command error");
            if let Some(reply) = e.to_reply() {
                let _ = ctx.reply(reply);
            }
        }

        ctx.halted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::{Database, HashCost, Privilege};
    use crate::state::registry::tests::test_session;

    async fn matrix() -> Arc<Matrix> {
        let mut config = Config::with_listen("127.0.0.1:0".parse().unwrap());
        config.presentation.color = false;
        let cost = HashCost {
            memory_kib: 64,
            iterations: 1,
        };
        let db = Database::new(":memory:", cost).await.unwrap();
        Arc::new(Matrix::new(&config, Arc::new(db)))
    }

    fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(line) = rx.try_recv() {
            out.push(line);
        }
        out
    }

    #[tokio::test]
    async fn test_table_covers_all_commands() {
        let d = Dispatcher::new(matrix().await);
        for name in [
            "help", "whoami", "echo", "who", "nick", "msg", "w", "whisper", "r", "reply", "bye",
            "logout", "passwd", "createuser", "deleteuser", "priv", "enumusers", "kick", "shutdown",
        ] {
            assert!(d.command_names().contains(&name), "missing {name}");
        }
    }

    #[tokio::test]
    async fn test_unknown_and_privilege_gate() {
        let m = matrix().await;
        let d = Dispatcher::new(Arc::clone(&m));
        let (bob, mut rx) = test_session("bob", 16);
        let bob_id = bob.id();
        m.registry.add(bob, "bob", Privilege::User).unwrap();

        let issuer = Issuer::Session(bob_id);
        assert!(!d.dispatch(Command::parse(issuer, "/frobnicate")).await);
        assert!(!d.dispatch(Command::parse(issuer, "/kick alice")).await);
        assert!(!d.dispatch(Command::parse(issuer, "/shutdown")).await);

        assert_eq!(
            drain(&mut rx),
            vec![
                "Unknown command.",
                ERR_PRIVILEGE,
                ERR_PRIVILEGE,
            ]
        );
        assert!(!m.shutdown.is_terminating());
    }

    #[tokio::test]
    async fn test_departed_issuer_is_ignored() {
        let m = matrix().await;
        let d = Dispatcher::new(Arc::clone(&m));
        let (bob, mut rx) = test_session("bob", 16);
        let bob_id = bob.id();
        m.registry.add(bob, "bob", Privilege::User).unwrap();
        m.registry.remove_session(bob_id);

        assert!(!d.dispatch(Command::parse(Issuer::Session(bob_id), "/who")).await);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_commands_run_in_submission_order() {
        let m = matrix().await;
        let d = Dispatcher::new(Arc::clone(&m));
        let (alice, mut rx) = test_session("alice", 64);
        let id = alice.id();
        m.registry.add(alice, "alice", Privilege::User).unwrap();

        let (tx, queue) = command_queue(16);
        let worker = tokio::spawn(d.run(queue));
        for i in 0..10 {
            tx.send(Command::parse(Issuer::Session(id), &format!("/echo {i}")))
                .await
                .unwrap();
        }
        drop(tx);
        worker.await.unwrap();

        let expected: Vec<String> = (0..10).map(|i| format!("Echo: {i}")).collect();
        assert_eq!(drain(&mut rx), expected);
    }

    #[tokio::test]
    async fn test_system_issuer_only_shuts_down() {
        let m = matrix().await;
        let d = Dispatcher::new(Arc::clone(&m));

        let who = Command {
            name: "who".to_string(),
            issuer: Issuer::System,
            args: Vec::new(),
        };
        assert!(!d.dispatch(who).await);

        assert!(d.dispatch(Command::system_shutdown()).await);
        assert!(m.shutdown.is_terminating());
    }
}
