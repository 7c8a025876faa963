//! `tasks|tests <ticket> [add <title>]`: list a workitem's subitems or
//! create one. Both commands share this handler, parameterized by kind.

use std::collections::BTreeMap;

use serde_json::json;

use corvid_tracker::Filter;

use crate::command_helpers::{create_asset_gated, get_workitem};
use crate::command_router::CommandInvocation;
use crate::plugin_error::PluginError;

pub(crate) async fn run(
    invocation: CommandInvocation,
    kind: &'static str,
    args: Vec<String>,
) -> Result<Vec<String>, PluginError> {
    let (number, rest) = args
        .split_first()
        .ok_or_else(|| PluginError::usage("a ticket number is required"))?;
    let session = invocation.session()?;
    let workitem = get_workitem(&session, number, &[]).await?;

    let Some((action, title_words)) = rest.split_first() else {
        // List mode.
        let mut subitems = session
            .query(kind)
            .filter(Filter::eq("Parent", &workitem.oid))
            .select(["Name", "Status.Name", "Status.Order"])
            .fetch()
            .await?;
        if subitems.is_empty() {
            return Ok(vec![format!("Didn't find any {kind}s for {number}")]);
        }
        subitems.sort_by(|left, right| {
            let left_order = left.attr_f64("Status.Order").unwrap_or_default();
            let right_order = right.attr_f64("Status.Order").unwrap_or_default();
            left_order.total_cmp(&right_order)
        });
        return Ok(subitems
            .iter()
            .map(|subitem| {
                format!(
                    "[{}] {} {}",
                    subitem.attr_str("Status.Name").unwrap_or(""),
                    subitem.attr_str("Name").unwrap_or(""),
                    session.asset_url(subitem)
                )
            })
            .collect());
    };

    if action != "add" {
        return Err(PluginError::Quit(format!(
            "I can't just \"{action}\" that, {{nick}}"
        )));
    }

    let title = title_words.join(" ");
    if title.is_empty() {
        return Err(PluginError::quit("I'm going to need a title for that, {nick}"));
    }

    let mut attributes = BTreeMap::new();
    attributes.insert("Name".to_string(), json!(title));
    attributes.insert("Parent".to_string(), json!(workitem.oid));
    let created = create_asset_gated(&invocation.config, &session, kind, attributes).await?;

    Err(PluginError::Quit(format!(
        "I created {} {} for you, {{nick}}",
        created.attr_str("Name").unwrap_or(title.as_str()),
        session.asset_url(&created)
    )))
}
