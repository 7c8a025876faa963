//! Deferred handler execution and the layered failure-recovery chain.
//!
//! Wrapping fixes the reply destination up front; the handler body then
//! runs as one spawned task per invocation, off the caller's stack, and
//! every classified failure degrades into a one-line chat message. Auth,
//! usage, and configuration hints go privately to the invoking user even
//! when the handler itself replies to the channel.

use std::{future::Future, sync::Arc};

use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::chat_transport::ChatTransport;
use crate::plugin_error::PluginError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Where a wrapped handler's successful output is delivered.
pub enum ReplyTo {
    Channel,
    Nick,
}

#[derive(Debug, Clone)]
/// Invocation context threaded through deferral and template rendering.
pub struct ReplyContext {
    pub channel: String,
    pub nick: String,
}

/// Substitutes `{nick}`/`{channel}` placeholders in a ControlledExit
/// message template.
pub fn render_quit_template(template: &str, ctx: &ReplyContext) -> String {
    template
        .replace("{nick}", &ctx.nick)
        .replace("{channel}", &ctx.channel)
}

/// Schedules `handler` as one deferred unit and returns immediately.
///
/// Exactly one task is spawned per call; concurrent invocations stay
/// independent and may complete in any order. The returned handle carries
/// any failure the recovery chain refuses to classify.
pub fn spawn_deferred<F>(
    transport: Arc<dyn ChatTransport>,
    ctx: ReplyContext,
    destination: ReplyTo,
    session_available: bool,
    handler: F,
) -> JoinHandle<Result<(), PluginError>>
where
    F: Future<Output = Result<Vec<String>, PluginError>> + Send + 'static,
{
    debug!(channel = %ctx.channel, nick = %ctx.nick, "deferring command handler");
    tokio::spawn(async move {
        match handler.await {
            Ok(lines) => {
                let text = lines.join("\n");
                if text.is_empty() {
                    return Ok(());
                }
                let target = match destination {
                    ReplyTo::Channel => &ctx.channel,
                    ReplyTo::Nick => &ctx.nick,
                };
                transport
                    .send_message(target, &text)
                    .await
                    .map_err(PluginError::Other)
            }
            Err(failure) => {
                deliver_recovery(transport, &ctx, destination, session_available, failure).await
            }
        }
    })
}

/// The fixed recovery chain: authentication, then usage, then controlled
/// exit. Unmatched failures propagate out of the deferred unit.
async fn deliver_recovery(
    transport: Arc<dyn ChatTransport>,
    ctx: &ReplyContext,
    destination: ReplyTo,
    session_available: bool,
    failure: PluginError,
) -> Result<(), PluginError> {
    let (target, text) = match failure {
        PluginError::Auth => {
            debug!(nick = %ctx.nick, "handler failed with an authentication error");
            (
                ctx.nick.clone(),
                format!(
                    "{}, you probably need to reset your token, try \"token\"",
                    ctx.nick
                ),
            )
        }
        PluginError::Usage(cause) => {
            if session_available {
                warn!(%cause, nick = %ctx.nick, "command usage failure, check the docs");
                (
                    ctx.nick.clone(),
                    format!(
                        "Umm... {}, you might want to check the docs for that",
                        ctx.nick
                    ),
                )
            } else {
                debug!(%cause, nick = %ctx.nick, "command needs a session but none was available");
                (
                    ctx.nick.clone(),
                    format!("{}, you might want to try \"oauth\" or \"token\"", ctx.nick),
                )
            }
        }
        PluginError::Config(detail) => {
            error!(%detail, "plugin misconfigured, check the settings");
            (
                ctx.nick.clone(),
                format!(
                    "Sorry {}, something went wrong on my side, try again later",
                    ctx.nick
                ),
            )
        }
        PluginError::Quit(template) => {
            let target = match destination {
                ReplyTo::Channel => ctx.channel.clone(),
                ReplyTo::Nick => ctx.nick.clone(),
            };
            (target, render_quit_template(&template, ctx))
        }
        other => {
            error!(error = %other, nick = %ctx.nick, "command handler failed with an unclassified error");
            return Err(other);
        }
    };
    transport
        .send_message(&target, &text)
        .await
        .map_err(PluginError::Other)
}
