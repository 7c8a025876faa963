//! Shared plumbing for command handlers: the write gate, workitem and
//! member lookups, and acknowledgement replies.

use std::collections::BTreeMap;

use anyhow::Context;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use corvid_store::DocStore;
use corvid_tracker::{Asset, Filter, TrackerError, TrackerSession};

use crate::plugin_config::PluginConfig;
use crate::plugin_error::PluginError;

pub(crate) const ALIASES_COLLECTION: &str = "aliases";
pub(crate) const TEAMS_COLLECTION: &str = "channel_teams";

pub(crate) const READONLY_REFUSAL: &str = "I would, but I'm not allowed to write :(";

const ACKS: &[&str] = &["roger", "10-4", "no problem", "ok", "sure thing", "done", "you got it"];

pub(crate) fn random_ack() -> String {
    ACKS.choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("ok")
        .to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Mapping from a chat identity to the tracker member name it goes by.
pub(crate) struct AliasRecord {
    pub chat_identity: String,
    pub tracker_identity_name: String,
}

pub(crate) fn lookup_alias(store: &DocStore, chat_identity: &str) -> anyhow::Result<Option<String>> {
    let Some(doc) = store.find_one(ALIASES_COLLECTION, &[("chat_identity", chat_identity)])? else {
        return Ok(None);
    };
    let record: AliasRecord = serde_json::from_value(doc).context("malformed alias record")?;
    Ok(Some(record.tracker_identity_name))
}

/// Applies staged updates and commits, respecting the write-access gate.
///
/// Updates are only staged once the gate allows them; staged-but-never-
/// committed fields would bleed into later reads of the same session.
pub(crate) async fn commit_staged(
    config: &PluginConfig,
    session: &TrackerSession,
    updates: Vec<(String, String, Value)>,
) -> Result<Vec<String>, PluginError> {
    if config.readonly {
        return Ok(vec![READONLY_REFUSAL.to_string()]);
    }
    for (oid, field, value) in updates {
        debug!(%oid, %field, "staging tracker update");
        session.stage_update(&oid, &field, value);
    }
    session.commit().await?;
    Ok(vec![random_ack()])
}

/// Creates an asset, respecting the write-access gate.
pub(crate) async fn create_asset_gated(
    config: &PluginConfig,
    session: &TrackerSession,
    kind: &str,
    attributes: BTreeMap<String, Value>,
) -> Result<Asset, PluginError> {
    if config.readonly {
        return Err(PluginError::quit("I'm sorry {nick}, write access is disabled"));
    }
    Ok(session.create(kind, attributes).await?)
}

/// Fetches a workitem by number or exits with a user-readable message.
pub(crate) async fn get_workitem(
    session: &TrackerSession,
    number: &str,
    select: &[&str],
) -> Result<Asset, PluginError> {
    let query = session
        .query("Workitem")
        .filter(Filter::eq("Number", number))
        .select(select.iter().copied());
    match query.first().await {
        Ok(asset) => Ok(asset),
        Err(TrackerError::NotFound) => Err(PluginError::Quit(format!(
            "I'm sorry {{nick}}, item \"{number}\" not found"
        ))),
        Err(error) => Err(error.into()),
    }
}

/// Resolves the tracker member behind a chat identity, going through the
/// alias mapping first and then an OR filter over the member name fields.
pub(crate) async fn get_member(
    session: &TrackerSession,
    store: &DocStore,
    target: &str,
) -> Result<Asset, PluginError> {
    let resolved = lookup_alias(store, target)?.unwrap_or_else(|| target.to_string());
    let filter = Filter::eq("Name", &resolved)
        .or_eq("Nickname", &resolved)
        .or_eq("Username", &resolved);
    let query = session
        .query("Member")
        .filter(filter)
        .select(["Name", "Nickname"]);
    match query.first().await {
        Ok(member) => Ok(member),
        Err(TrackerError::NotFound) => Err(PluginError::Quit(format!(
            "I'm sorry {{nick}}, couldn't find {target} in the tracker as {resolved}. Check \"alias\""
        ))),
        Err(error) => Err(error.into()),
    }
}
