//! `alias [lookup | set | remove] [target]`: chat-to-tracker name mapping.

use serde_json::json;

use crate::command_helpers::{lookup_alias, random_ack, ALIASES_COLLECTION};
use crate::command_router::CommandInvocation;
use crate::plugin_error::PluginError;

pub(crate) async fn run(
    invocation: CommandInvocation,
    args: Vec<String>,
) -> Result<Vec<String>, PluginError> {
    let nick = invocation.nick.clone();
    let mut target = nick.clone();
    let subaction = match args.split_first() {
        None => "lookup".to_string(),
        Some((first, rest)) => {
            if rest.is_empty() {
                // Exactly one argument: it is a target to look up unless it
                // names a zero-argument subaction.
                if first == "lookup" || first == "remove" {
                    first.clone()
                } else {
                    target = first.clone();
                    "lookup".to_string()
                }
            } else {
                target = rest.join(" ");
                first.clone()
            }
        }
    };

    match subaction.as_str() {
        "lookup" => {
            let known_as = lookup_alias(&invocation.store, &target)?
                .unwrap_or_else(|| target.clone());
            Ok(vec![format!("{target} is known as {known_as} in the tracker")])
        }
        "set" => {
            invocation.store.save(
                ALIASES_COLLECTION,
                &[("chat_identity", &nick)],
                json!({"chat_identity": nick, "tracker_identity_name": target}),
            )?;
            Ok(vec![random_ack()])
        }
        "remove" => {
            // Self-service only; nobody gets to drop someone else's alias.
            if target != nick {
                return Ok(vec![format!(
                    "That's not nice {nick}. You can't remove {target}"
                )]);
            }
            invocation
                .store
                .find_and_delete(ALIASES_COLLECTION, &[("chat_identity", &nick)])?;
            Ok(vec![random_ack()])
        }
        other => Ok(vec![format!("No {nick}, you can't {other}!")]),
    }
}
