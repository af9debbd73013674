//! Private messages: MSG (W, WHISPER) and REPLY (R).

use super::{Context, Handler};
use crate::error::HandlerResult;
use crate::state::WhisperKind;
use async_trait::async_trait;
use tracing::debug;

/// Handler for MSG, W and WHISPER.
///
/// `msg <nickname> <text>`
pub struct MsgHandler;

#[async_trait]
impl Handler for MsgHandler {
    async fn handle(&self, ctx: &mut Context<'_>) -> HandlerResult {
        if ctx.args.len() < 2 {
            return ctx.reply("Invalid message format. Use: /msg <nickname> <message>");
        }
        let target = ctx.args[0].as_str();
        let text = ctx.rest(1);
        if text.trim().is_empty() {
            return ctx.reply("Message what?");
        }

        let me = ctx.me()?;
        debug!(from = %me.nickname, to = %target, "Private message");
        ctx.matrix
            .registry
            .whisper(me.id(), target, WhisperKind::Whisper, &text)
    }
}

/// Handler for R and REPLY.
///
/// `r <text>` sends to whoever last messaged the issuer.
pub struct ReplyHandler;

#[async_trait]
impl Handler for ReplyHandler {
    async fn handle(&self, ctx: &mut Context<'_>) -> HandlerResult {
        let me = ctx.me()?;
        let Some(target) = me.last_msg_from.clone() else {
            return ctx.reply("No user to reply to.");
        };
        let text = ctx.rest(0);
        if text.trim().is_empty() {
            return ctx.reply("Invalid reply format. Use: /r <message>");
        }

        ctx.matrix
            .registry
            .whisper(me.id(), &target, WhisperKind::Reply, &text)
    }
}
