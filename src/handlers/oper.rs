//! Operator commands: KICK and SHUTDOWN.

use super::{Context, Handler};
use crate::error::{ChatError, ERR_INVALID_SHUTDOWN_TIME, HandlerResult};
use async_trait::async_trait;
use tracing::{info, warn};

/// Disconnect the session holding `target` on behalf of the issuer.
///
/// The target is told why, closed and removed; everyone else (the issuer
/// included) sees the broadcast, then the issuer gets a confirmation.
pub fn kick(ctx: &Context<'_>, target: &str, reason: &str) -> HandlerResult {
    let issuer = ctx.nickname().to_string();
    if target.eq_ignore_ascii_case(&issuer) {
        info!(nick = %issuer, "Tried to kick themselves");
        return Err(ChatError::InvalidArgument("cannot kick yourself"));
    }

    let registry = &ctx.matrix.registry;
    let Some(victim) = registry.find(target) else {
        info!(target = %target, "Kick failed: user not found");
        return Err(ChatError::InvalidArgument("user not found"));
    };

    let reason = reason.trim();
    let (notice, announcement) = if reason.is_empty() {
        (
            format!("You have been kicked by {issuer}."),
            format!("{} has been kicked.", victim.nickname),
        )
    } else {
        (
            format!("You have been kicked by {issuer}: {reason}"),
            format!("{} has been kicked by {issuer}: {reason}", victim.nickname),
        )
    };

    if let Err(e) = registry.send_line(victim.id(), notice) {
        warn!(nick = %victim.nickname, error = %e, "Failed to notify kicked user");
    }
    victim.session.close();
    registry.remove_session(victim.id());

    info!("{}", announcement);
    registry.broadcast_except(victim.id(), &[announcement]);

    ctx.reply(format!("User {} has been kicked.", victim.nickname))
}

/// Handler for KICK.
///
/// `kick <nickname> [reason]`
pub struct KickHandler;

#[async_trait]
impl Handler for KickHandler {
    async fn handle(&self, ctx: &mut Context<'_>) -> HandlerResult {
        let Some(target) = ctx.args.first() else {
            return ctx.reply("Usage: /kick <nickname> [reason]");
        };
        let reason = ctx.rest(1);

        match kick(ctx, target, &reason) {
            Err(ChatError::InvalidArgument(why)) => {
                ctx.reply(format!("Error executing kick command. {why}"))
            }
            other => other,
        }
    }
}

/// Handler for SHUTDOWN.
///
/// `shutdown [seconds]`; no argument means now. Once accepted the
/// dispatcher stops taking commands, even while a countdown runs.
pub struct ShutdownHandler;

#[async_trait]
impl Handler for ShutdownHandler {
    async fn handle(&self, ctx: &mut Context<'_>) -> HandlerResult {
        let delay = match ctx.args.first() {
            None => 0,
            Some(arg) => match arg.parse::<u64>() {
                Ok(secs) => secs,
                Err(_) => return ctx.reply(ERR_INVALID_SHUTDOWN_TIME),
            },
        };

        info!(by = %ctx.nickname(), delay_secs = delay, "Shutdown requested");
        ctx.halt_dispatcher();
        ctx.matrix.shutdown.request(delay).await;
        Ok(())
    }
}
