//! Session-level commands: WHOAMI, ECHO, WHO, NICK, BYE.

use super::{Context, Handler};
use crate::error::HandlerResult;
use crate::state::nick;
use async_trait::async_trait;
use tracing::info;

/// Handler for WHOAMI.
///
/// Admins also see the address they connected from.
pub struct WhoamiHandler;

#[async_trait]
impl Handler for WhoamiHandler {
    async fn handle(&self, ctx: &mut Context<'_>) -> HandlerResult {
        let me = ctx.me()?;
        let line = if me.is_admin() {
            format!("You are: {} (admin) ({})", me.nickname, me.session.addr())
        } else {
            format!("You are: {} (user)", me.nickname)
        };
        ctx.reply(line)
    }
}

/// Handler for ECHO.
///
/// `echo <text>`
pub struct EchoHandler;

#[async_trait]
impl Handler for EchoHandler {
    async fn handle(&self, ctx: &mut Context<'_>) -> HandlerResult {
        if ctx.args.is_empty() {
            return ctx.reply("Usage: /echo <message>");
        }
        let text = ctx.rest(0);
        info!(nick = %ctx.nickname(), text = %text, "Echo");
        ctx.reply(format!("Echo: {text}"))
    }
}

/// Handler for WHO.
pub struct WhoHandler;

#[async_trait]
impl Handler for WhoHandler {
    async fn handle(&self, ctx: &mut Context<'_>) -> HandlerResult {
        let mut lines = vec!["Current Users:".to_string()];
        lines.extend(ctx.matrix.registry.listing(ctx.is_admin()));
        lines.push("(end of list)".to_string());
        ctx.reply_lines(&lines)
    }
}

/// Handler for NICK.
///
/// `nick <new>`
///
/// The rename is atomic in the registry; everyone sees `<old> is now: <new>`.
pub struct NickHandler;

#[async_trait]
impl Handler for NickHandler {
    async fn handle(&self, ctx: &mut Context<'_>) -> HandlerResult {
        let Some(requested) = ctx.args.first() else {
            return ctx.reply("Please provide a new nickname. Use: /nick <newNickname>");
        };
        nick::validate(requested)?;

        let id = ctx.me()?.id();
        let old = ctx.matrix.registry.rename(id, requested)?;
        info!(old = %old, new = %requested, "Nickname changed");
        ctx.matrix
            .registry
            .broadcast_line(format!("{old} is now: {requested}"));
        Ok(())
    }
}

/// Handler for BYE and LOGOUT.
pub struct ByeHandler;

#[async_trait]
impl Handler for ByeHandler {
    async fn handle(&self, ctx: &mut Context<'_>) -> HandlerResult {
        let me = ctx.me()?;
        info!(nick = %me.nickname, "User has quit");

        let registry = &ctx.matrix.registry;
        if let Some(gone) = registry.remove_session(me.id()) {
            gone.session.close();
            registry.broadcast_line(format!("{} has left the chat", gone.nickname));
        }
        Ok(())
    }
}
