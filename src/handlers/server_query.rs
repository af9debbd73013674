//! Server query handlers: HELP.

use super::{Context, Handler};
use crate::error::HandlerResult;
use async_trait::async_trait;

const USER_HELP: &[&str] = &[
    "<title>Available commands:</title>",
    "<cmd>/whoami</cmd> - Display your current nickname and privilege level",
    "<cmd>/echo</cmd> &lt;message&gt; - Echo back the message",
    "<cmd>/msg</cmd> &lt;nickname&gt; &lt;message&gt; - Send a private message",
    "<cmd>/reply</cmd> &lt;message&gt; - Reply to the last private message received",
    "<cmd>/bye</cmd> or /logout - Logout from the chat",
    "<cmd>/who</cmd> - List all users in the chat",
    "<cmd>/nick</cmd> &lt;newNickname&gt; - Change your nickname",
    "<cmd>/passwd</cmd> &lt;username&gt; &lt;newPassword&gt; - Change your password",
    "<cmd>/help</cmd> - Display this help information",
];

const ADMIN_HELP: &[&str] = &[
    "",
    "<title>Admin commands:</title>",
    "<cmd>/createuser</cmd> &lt;username&gt; &lt;password&gt; - Create a new user",
    "<cmd>/priv</cmd> &lt;username&gt; &lt;level&gt; - Change user privileges",
    "<cmd>/deleteuser</cmd> &lt;username&gt; - Delete a user",
    "<cmd>/enumusers</cmd> - List all users",
    "<cmd>/kick</cmd> &lt;nickname&gt; [reason] - Kick a user",
    "<cmd>/shutdown</cmd> [seconds] - Shutdown the server with an optional countdown",
];

/// Handler for HELP.
///
/// Admins also get the admin command section.
pub struct HelpHandler;

#[async_trait]
impl Handler for HelpHandler {
    async fn handle(&self, ctx: &mut Context<'_>) -> HandlerResult {
        let markup = ctx.matrix.markup();
        let admin = ctx.is_admin();

        let lines: Vec<String> = USER_HELP
            .iter()
            .chain(ADMIN_HELP.iter().filter(|_| admin))
            .map(|line| markup.render(line))
            .collect();
        ctx.reply_lines(&lines)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::db::{Database, HashCost, Privilege};
    use crate::handlers::{Command, Dispatcher, Issuer};
    use crate::state::Matrix;
    use crate::state::registry::tests::test_session;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(line) = rx.try_recv() {
            out.push(line);
        }
        out
    }

    #[tokio::test]
    async fn test_help_sections_by_privilege() {
        let mut config = Config::with_listen("127.0.0.1:0".parse().unwrap());
        config.presentation.color = false;
        let cost = HashCost {
            memory_kib: 64,
            iterations: 1,
        };
        let db = Database::new(":memory:", cost).await.unwrap();
        let m = Arc::new(Matrix::new(&config, Arc::new(db)));
        let d = Dispatcher::new(Arc::clone(&m));

        let (a, mut ra) = test_session("alice", 64);
        let (r, mut rr) = test_session("admin", 64);
        let (a_id, r_id) = (a.id(), r.id());
        m.registry.add(a, "alice", Privilege::User).unwrap();
        m.registry.add(r, "admin", Privilege::Admin).unwrap();

        d.dispatch(Command::parse(Issuer::Session(a_id), "/HELP")).await;
        d.dispatch(Command::parse(Issuer::Session(r_id), "/help")).await;

        let user = drain(&mut ra);
        assert_eq!(user[0], "Available commands:");
        assert!(user.contains(&"/echo <message> - Echo back the message".to_string()));
        assert!(!user.iter().any(|l| l.contains("Admin commands")));

        let admin = drain(&mut rr);
        assert!(admin.len() > user.len());
        assert!(admin.contains(&"Admin commands:".to_string()));
    }
}
