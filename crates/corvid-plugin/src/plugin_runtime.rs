//! Entry point: resolves a session once per trigger event and dispatches
//! to the command router or the passive ticket-lookup path.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use corvid_store::DocStore;
use corvid_tracker::{Filter, TrackerSession};

use crate::chat_transport::ChatTransport;
use crate::command_router::{dispatch_subcommand, CommandInvocation, RouterOutcome};
use crate::credential_resolver::{resolve_credentials, ResolvedCredential};
use crate::deferred_reply::{spawn_deferred, ReplyContext, ReplyTo};
use crate::plugin_config::PluginConfig;
use crate::plugin_error::PluginError;
use crate::session_factory::{open_session, SharedSessionCache};
use crate::ticket_refs::{TicketReference, TicketReferenceExtractor};

#[derive(Debug, Clone)]
/// How the chat framework triggered us.
pub enum TriggerInvocation {
    /// Explicit `<subcommand> [args...]` invocation. `None` subcommand
    /// means the bare trigger, which gets the help listing.
    Command {
        subcommand: Option<String>,
        args: Vec<String>,
    },
    /// Ordinary channel text to scan for ticket references.
    Passive,
}

#[derive(Debug, Clone)]
/// One parsed trigger event from the chat framework.
pub struct TriggerEvent {
    pub channel: String,
    pub nick: String,
    pub message: String,
    pub invocation: TriggerInvocation,
}

/// What `handle_event` did; deferred work can be awaited through the
/// handle when callers need completion (tests, drain-on-shutdown).
pub enum EventOutcome {
    /// Reply already sent inline, nothing scheduled.
    Immediate,
    /// One deferred unit scheduled.
    Deferred(JoinHandle<Result<(), PluginError>>),
    /// Nothing to do (passive text without ticket references).
    Silent,
}

/// The plugin engine. One instance serves all channels and users; all
/// per-invocation state is threaded through explicitly.
pub struct TrackerPlugin {
    config: Arc<PluginConfig>,
    store: Arc<DocStore>,
    transport: Arc<dyn ChatTransport>,
    extractor: TicketReferenceExtractor,
    shared_sessions: Arc<SharedSessionCache>,
}

impl TrackerPlugin {
    pub fn new(
        config: PluginConfig,
        store: DocStore,
        transport: Arc<dyn ChatTransport>,
    ) -> anyhow::Result<Self> {
        let extractor =
            TicketReferenceExtractor::new(&config.known_prefixes, &config.special_kinds)?;
        Ok(Self {
            config: Arc::new(config),
            store: Arc::new(store),
            transport,
            extractor,
            shared_sessions: Arc::new(SharedSessionCache::default()),
        })
    }

    pub fn shared_sessions(&self) -> &Arc<SharedSessionCache> {
        &self.shared_sessions
    }

    /// Handles one trigger event.
    ///
    /// The session is resolved exactly once; an open failure is logged and
    /// degrades to `None` so the event still reaches its handler, which
    /// reports the condition as a usage failure.
    pub async fn handle_event(&self, event: TriggerEvent) -> Result<EventOutcome, PluginError> {
        let session = match self.open_session_for(&event.nick).await {
            Ok(session) => Some(session),
            Err(PluginError::Config(detail)) => {
                error!(%detail, "plugin misconfigured, check the settings");
                None
            }
            Err(failure) => {
                warn!(nick = %event.nick, %failure, "no tracker session for this event");
                None
            }
        };

        match event.invocation {
            TriggerInvocation::Command { subcommand, args } => {
                debug!(
                    nick = %event.nick,
                    subcommand = subcommand.as_deref().unwrap_or("<help>"),
                    "dispatching subcommand"
                );
                let invocation = CommandInvocation {
                    session,
                    shared_sessions: self.shared_sessions.clone(),
                    store: self.store.clone(),
                    config: self.config.clone(),
                    transport: self.transport.clone(),
                    channel: event.channel.clone(),
                    nick: event.nick.clone(),
                };
                match dispatch_subcommand(invocation, subcommand.as_deref(), args) {
                    RouterOutcome::Immediate(lines) => {
                        self.transport
                            .send_message(&event.channel, &lines.join("\n"))
                            .await?;
                        Ok(EventOutcome::Immediate)
                    }
                    RouterOutcome::Dispatched(handle) => Ok(EventOutcome::Deferred(handle)),
                }
            }
            TriggerInvocation::Passive => {
                let references = self.extractor.extract(&event.message);
                if references.is_empty() {
                    // Passive matching stays silent on empty results.
                    return Ok(EventOutcome::Silent);
                }
                debug!(count = references.len(), "passive ticket references found");
                let ctx = ReplyContext {
                    channel: event.channel.clone(),
                    nick: event.nick.clone(),
                };
                let session_available = session.is_some();
                let handle = spawn_deferred(
                    self.transport.clone(),
                    ctx,
                    ReplyTo::Channel,
                    session_available,
                    describe_references(session, references),
                );
                Ok(EventOutcome::Deferred(handle))
            }
        }
    }

    async fn open_session_for(&self, nick: &str) -> Result<Arc<TrackerSession>, PluginError> {
        let credential = resolve_credentials(&self.store, &self.config, nick)?;
        match credential {
            ResolvedCredential::ServiceAccount => {
                if let Some(cached) = self.shared_sessions.get() {
                    return Ok(cached);
                }
                let session = Arc::new(open_session(&self.config, &credential).await?);
                self.shared_sessions.put(session.clone());
                Ok(session)
            }
            per_user => Ok(Arc::new(open_session(&self.config, &per_user).await?)),
        }
    }
}

/// Batched description lookup for passively matched references.
///
/// References are grouped by kind in first-seen order; each kind costs one
/// OR-joined query. Duplicate numbers are deduplicated here because the
/// extractor deliberately is not a set.
async fn describe_references(
    session: Option<Arc<TrackerSession>>,
    references: Vec<TicketReference>,
) -> Result<Vec<String>, PluginError> {
    let session = session
        .ok_or_else(|| PluginError::usage("no tracker session is available"))?;

    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for reference in references {
        match groups.iter_mut().find(|(kind, _)| *kind == reference.kind) {
            Some((_, numbers)) => {
                if !numbers.contains(&reference.token) {
                    numbers.push(reference.token);
                }
            }
            None => groups.push((reference.kind, vec![reference.token])),
        }
    }

    let mut lines = Vec::new();
    for (kind, numbers) in groups {
        let filter = Filter::any_eq("Number", numbers.iter().map(String::as_str));
        let assets = session
            .query(&kind)
            .filter(filter)
            .select(["Name", "Number"])
            .fetch()
            .await?;
        lines.extend(assets.iter().map(|asset| {
            format!(
                "[{}] {} ({})",
                asset.attr_str("Number").unwrap_or(""),
                asset.attr_str("Name").unwrap_or(""),
                session.asset_url(asset)
            )
        }));
    }
    Ok(lines)
}
