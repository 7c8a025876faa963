//! Keyword-to-handler routing for explicit subcommand invocations.

use std::sync::Arc;

use tokio::task::JoinHandle;

use corvid_store::DocStore;
use corvid_tracker::TrackerSession;

use crate::chat_transport::ChatTransport;
use crate::deferred_reply::{spawn_deferred, ReplyContext, ReplyTo};
use crate::plugin_config::PluginConfig;
use crate::plugin_error::PluginError;
use crate::session_factory::SharedSessionCache;
use crate::{
    alias_command, oauth_command, reload_command, review_command, subitem_command, take_command,
    team_command, token_command, user_command,
};

/// Everything a command handler gets to work with. Handlers share the
/// uniform shape `run(invocation, args) -> Result<Vec<String>, _>`.
pub struct CommandInvocation {
    /// `None` when session opening failed; handlers that need the tracker
    /// surface this as a usage failure instead of aborting the event.
    pub session: Option<Arc<TrackerSession>>,
    pub shared_sessions: Arc<SharedSessionCache>,
    pub store: Arc<DocStore>,
    pub config: Arc<PluginConfig>,
    pub transport: Arc<dyn ChatTransport>,
    pub channel: String,
    pub nick: String,
}

impl CommandInvocation {
    pub fn session(&self) -> Result<Arc<TrackerSession>, PluginError> {
        self.session
            .clone()
            .ok_or_else(|| PluginError::usage("no tracker session is available"))
    }

    pub fn reply_context(&self) -> ReplyContext {
        ReplyContext {
            channel: self.channel.clone(),
            nick: self.nick.clone(),
        }
    }
}

/// What the router did with a subcommand.
pub enum RouterOutcome {
    /// Synchronous reply, no remote call involved.
    Immediate(Vec<String>),
    /// Handler scheduled as a deferred unit.
    Dispatched(JoinHandle<Result<(), PluginError>>),
}

/// The static help listing returned when no subcommand is given.
pub fn help_listing() -> Vec<String> {
    vec![
        "Usage for the work-tracker plugin".to_string(),
        "alias [lookup | set | remove] [target] - Lookup an alias, or set/remove your own"
            .to_string(),
        "oauth [<code> | forget] - Configure or remove your delegated tokens".to_string(),
        "reload - Rebuild the shared tracker session".to_string(),
        "review <ticket> [!]<text> - Lookup, append, or set the code review field (alias: cr)"
            .to_string(),
        "take <ticket> - Add yourself to the ticket's Owners".to_string(),
        "tasks <ticket> (add <title>) - List tasks for a ticket, or add one".to_string(),
        "team[s] [add | remove | list] <name> - Add, remove, or list teams for the channel"
            .to_string(),
        "tests <ticket> (add <title>) - List tests for a ticket, or add one".to_string(),
        "token [<code> | forget] - Configure or remove your personal access token".to_string(),
        "user [<nick>] - Lookup the tracker member for a nick".to_string(),
    ]
}

/// Routes one subcommand to its wrapped handler.
///
/// Unknown keywords and the missing-subcommand help listing reply
/// synchronously; no remote call happens, so neither goes through the
/// deferred wrapper. Arity is the handler's business, not the router's.
pub fn dispatch_subcommand(
    invocation: CommandInvocation,
    subcommand: Option<&str>,
    args: Vec<String>,
) -> RouterOutcome {
    let Some(subcommand) = subcommand else {
        return RouterOutcome::Immediate(help_listing());
    };

    let transport = invocation.transport.clone();
    let ctx = invocation.reply_context();
    let session_available = invocation.session.is_some();
    let defer = |destination: ReplyTo,
                 handler: std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<String>, PluginError>> + Send>,
    >| {
        RouterOutcome::Dispatched(spawn_deferred(
            transport.clone(),
            ctx.clone(),
            destination,
            session_available,
            handler,
        ))
    };

    match subcommand {
        "alias" => defer(ReplyTo::Channel, Box::pin(alias_command::run(invocation, args))),
        "token" => defer(ReplyTo::Nick, Box::pin(token_command::run(invocation, args))),
        "oauth" => defer(ReplyTo::Nick, Box::pin(oauth_command::run(invocation, args))),
        "review" | "cr" => {
            defer(ReplyTo::Channel, Box::pin(review_command::run(invocation, args)))
        }
        "take" => defer(ReplyTo::Channel, Box::pin(take_command::run(invocation, args))),
        "tasks" => defer(
            ReplyTo::Channel,
            Box::pin(subitem_command::run(invocation, "Task", args)),
        ),
        "tests" => defer(
            ReplyTo::Channel,
            Box::pin(subitem_command::run(invocation, "Test", args)),
        ),
        "team" | "teams" => {
            defer(ReplyTo::Channel, Box::pin(team_command::run(invocation, args)))
        }
        "user" => defer(ReplyTo::Channel, Box::pin(user_command::run(invocation, args))),
        "reload" => defer(ReplyTo::Channel, Box::pin(reload_command::run(invocation, args))),
        unknown => RouterOutcome::Immediate(vec![format!(
            "Umm... {unknown}, Never heard of it?"
        )]),
    }
}
