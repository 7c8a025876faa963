//! `team|teams [add | remove | list] <name>`: per-channel cache of team
//! room links.

use std::collections::BTreeMap;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::json;

use corvid_tracker::{Asset, Filter, TrackerError, TrackerSession};

use crate::command_helpers::{random_ack, TEAMS_COLLECTION};
use crate::command_router::CommandInvocation;
use crate::plugin_error::PluginError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChannelTeamsRecord {
    name: String,
    #[serde(default)]
    teams: BTreeMap<String, String>,
}

fn load_channel_teams(
    invocation: &CommandInvocation,
) -> Result<ChannelTeamsRecord, PluginError> {
    let Some(doc) = invocation
        .store
        .find_one(TEAMS_COLLECTION, &[("name", &invocation.channel)])?
    else {
        return Ok(ChannelTeamsRecord {
            name: invocation.channel.clone(),
            teams: BTreeMap::new(),
        });
    };
    Ok(serde_json::from_value(doc).context("malformed channel teams record")?)
}

fn save_channel_teams(
    invocation: &CommandInvocation,
    record: &ChannelTeamsRecord,
) -> Result<(), PluginError> {
    invocation.store.save(
        TEAMS_COLLECTION,
        &[("name", &record.name)],
        serde_json::to_value(record).context("failed to encode channel teams record")?,
    )?;
    Ok(())
}

/// Builds the room links cached for a team: one link per room, or the
/// team's own URL when it has no rooms.
fn room_links(session: &TrackerSession, team: &Asset) -> String {
    let links = team
        .attr_list("Rooms")
        .iter()
        .filter_map(|room| room.as_str().map(str::to_string))
        .map(|oid| {
            let room_id = oid.rsplit_once(':').map(|(_, id)| id.to_string()).unwrap_or(oid);
            format!("{}/TeamRoom.mvc/Show/{room_id}", session.base_url())
        })
        .collect::<Vec<_>>()
        .join(", ");
    if links.is_empty() {
        session.asset_url(team)
    } else {
        links
    }
}

pub(crate) async fn run(
    invocation: CommandInvocation,
    args: Vec<String>,
) -> Result<Vec<String>, PluginError> {
    let (subaction, rest) = match args.split_first() {
        None => ("list".to_string(), Vec::new()),
        Some((first, rest)) => (first.clone(), rest.to_vec()),
    };
    // Whitespace was lost in command tokenization; rejoin and hope.
    let name = rest.join(" ");
    let nick = invocation.nick.as_str();
    let channel = invocation.channel.as_str();
    let mut record = load_channel_teams(&invocation)?;

    match subaction.as_str() {
        "list" => {
            if record.teams.is_empty() {
                return Ok(vec![format!("No teams found for {channel}")]);
            }
            Ok(record
                .teams
                .iter()
                .map(|(team, links)| format!("{team} {links}"))
                .collect())
        }
        "add" => {
            let session = invocation.session()?;
            let team = match session
                .query("Team")
                .filter(Filter::eq("Name", &name))
                .select(["Name", "Rooms"])
                .first()
                .await
            {
                Ok(team) => team,
                Err(TrackerError::NotFound) => {
                    return Ok(vec![format!(
                        "I'm sorry {nick}, team name \"{name}\" not found"
                    )]);
                }
                Err(error) => return Err(error.into()),
            };
            record.teams.insert(name, room_links(&session, &team));
            save_channel_teams(&invocation, &record)?;
            Ok(vec![random_ack()])
        }
        "remove" => {
            if record.teams.remove(&name).is_none() {
                return Ok(vec![format!(
                    "I'm sorry {nick}, team name \"{name}\" not found for {channel}"
                )]);
            }
            save_channel_teams(&invocation, &record)?;
            Ok(vec![random_ack()])
        }
        other => Ok(vec![format!("No {nick}, you can't {other}!")]),
    }
}
