//! Account management: PASSWD, CREATEUSER, DELETEUSER, PRIV, ENUMUSERS.
//!
//! Everything except PASSWD on one's own account is admin-only; the
//! dispatcher enforces that before these handlers run.

use super::oper::kick;
use super::{Context, Handler};
use crate::db::{BOOTSTRAP_ADMIN, Privilege};
use crate::error::HandlerResult;
use crate::state::nick;
use async_trait::async_trait;
use tracing::{info, warn};

/// Handler for PASSWD.
///
/// `passwd <username> <newpassword>`
///
/// Users may only change their own password; admins may change any.
pub struct PasswdHandler;

#[async_trait]
impl Handler for PasswdHandler {
    async fn handle(&self, ctx: &mut Context<'_>) -> HandlerResult {
        let [target, password] = ctx.args else {
            return ctx.reply("Usage: /passwd <username> <newPassword>");
        };

        if ctx.is_admin() {
            let reply = match ctx.matrix.store.update_password(target, password).await {
                Ok(()) => {
                    info!(by = %ctx.nickname(), account = %target, "Password changed");
                    format!("Password for {target} updated successfully.")
                }
                Err(e) => format!("Error changing password for {target}: {e}"),
            };
            return ctx.reply(reply);
        }

        let username = ctx.me()?.session.username().to_string();
        if !target.eq_ignore_ascii_case(&username) {
            return ctx.reply("You can only change your own password.");
        }
        match ctx.matrix.store.update_password(&username, password).await {
            Ok(()) => {
                info!(account = %username, "Password changed by owner");
                ctx.reply("Your password has been updated successfully.")
            }
            Err(e) => {
                warn!(account = %username, error = %e, "Password change failed");
                ctx.reply("Error updating your password. Please try again later.")
            }
        }
    }
}

/// Handler for CREATEUSER.
///
/// `createuser <username> <password>`; new accounts are regular users.
pub struct CreateUserHandler;

#[async_trait]
impl Handler for CreateUserHandler {
    async fn handle(&self, ctx: &mut Context<'_>) -> HandlerResult {
        let [username, password] = ctx.args else {
            return ctx.reply("Usage: /createuser <username> <password>");
        };
        nick::validate(username)?;

        let reply = match ctx
            .matrix
            .store
            .create_account(username, password, Privilege::User)
            .await
        {
            Ok(account) => {
                info!(by = %ctx.nickname(), account = %account.username, "Account created");
                format!("User {username} created successfully.")
            }
            Err(e) => format!("Error creating user: {e}"),
        };
        ctx.reply(reply)
    }
}

/// Handler for DELETEUSER.
///
/// `deleteuser <username>`
///
/// Refuses the issuer's own account. Sessions logged in as the target are
/// kicked before the account is removed.
pub struct DeleteUserHandler;

#[async_trait]
impl Handler for DeleteUserHandler {
    async fn handle(&self, ctx: &mut Context<'_>) -> HandlerResult {
        let [target] = ctx.args else {
            return ctx.reply("Usage: /deleteuser <username>");
        };

        if let Some(me) = &ctx.profile
            && me.session.username().eq_ignore_ascii_case(target)
        {
            return ctx.reply("Deleting current user is not allowed.");
        }

        for online in ctx.matrix.registry.find_by_username(target) {
            kick(ctx, &online.nickname, "User deleted by administrator")?;
        }

        let reply = match ctx.matrix.store.delete_account(target).await {
            Ok(()) => {
                info!(by = %ctx.nickname(), account = %target, "Account deleted");
                format!("User {target} deleted successfully.")
            }
            Err(e) => format!("Error deleting user {target}: {e}"),
        };
        ctx.reply(reply)
    }
}

/// Handler for PRIV.
///
/// `priv <username> <0|1>`
///
/// The bootstrap admin account can't be changed. Sessions logged in as the
/// target pick up the new level immediately.
pub struct PrivHandler;

const PRIV_SYNTAX: &str = "Usage: /priv <username> <privilege> (0: user, 1: admin)";

#[async_trait]
impl Handler for PrivHandler {
    async fn handle(&self, ctx: &mut Context<'_>) -> HandlerResult {
        let [target, level] = ctx.args else {
            return ctx.reply(PRIV_SYNTAX);
        };
        if target.eq_ignore_ascii_case(BOOTSTRAP_ADMIN) {
            return ctx.reply(format!(
                "Privilege level change for user '{BOOTSTRAP_ADMIN}' is not allowed."
            ));
        }
        let Some(privilege) = level.parse().ok().and_then(Privilege::from_level) else {
            return ctx.reply(PRIV_SYNTAX);
        };

        if let Err(e) = ctx.matrix.store.update_privilege(target, privilege).await {
            return ctx.reply(format!("Error changing privilege for user {target}: {e}"));
        }

        let live = ctx.matrix.registry.set_privilege(target, privilege);
        info!(
            by = %ctx.nickname(),
            account = %target,
            privilege = privilege.label(),
            live,
            "Privilege changed"
        );
        ctx.reply(format!("Privilege for user {target} updated successfully."))
    }
}

/// Handler for ENUMUSERS.
pub struct EnumUsersHandler;

#[async_trait]
impl Handler for EnumUsersHandler {
    async fn handle(&self, ctx: &mut Context<'_>) -> HandlerResult {
        let accounts = match ctx.matrix.store.list_accounts().await {
            Ok(accounts) => accounts,
            Err(e) => return ctx.reply(format!("Error enumerating users: {e}")),
        };

        let mut lines: Vec<String> = accounts
            .into_iter()
            .map(|a| {
                if a.privilege.is_admin() {
                    format!("{} (admin)", a.username)
                } else {
                    a.username
                }
            })
            .collect();
        lines.push("(End of list)".to_string());
        ctx.reply_lines(&lines)
    }
}
