//! Corvid: a chat-bot plugin engine for querying and mutating tickets in a
//! remote work tracker.
//!
//! The core is the asynchronous command-dispatch and credential-resolution
//! pipeline: per-user credential resolution, session construction, ticket
//! reference extraction from passive text, and deferred handler execution
//! with a layered failure-recovery chain. The chat transport, the tracker
//! wire protocol, and the local document store are collaborators behind
//! small seams (`ChatTransport`, `corvid-tracker`, `corvid-store`).

mod alias_command;
mod chat_transport;
mod command_helpers;
mod command_router;
mod credential_resolver;
mod deferred_reply;
mod oauth_command;
mod plugin_config;
mod plugin_error;
mod plugin_runtime;
mod reload_command;
mod review_command;
mod session_factory;
mod subitem_command;
mod take_command;
mod team_command;
mod ticket_refs;
mod token_command;
mod user_command;

pub use chat_transport::ChatTransport;
pub use command_router::{dispatch_subcommand, help_listing, CommandInvocation, RouterOutcome};
pub use credential_resolver::{
    load_credential_record, normalize_chat_identity, resolve_credentials, save_credential_record,
    CredentialRecord, DelegatedCredential, ResolvedCredential,
};
pub use deferred_reply::{render_quit_template, spawn_deferred, ReplyContext, ReplyTo};
pub use plugin_config::{load_plugin_config, PluginConfig};
pub use plugin_error::PluginError;
pub use plugin_runtime::{EventOutcome, TrackerPlugin, TriggerEvent, TriggerInvocation};
pub use session_factory::{open_session, SharedSessionCache};
pub use ticket_refs::{TicketReference, TicketReferenceExtractor, DEFAULT_TICKET_KIND};
