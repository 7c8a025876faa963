//! `user [<name>]`: look up the tracker member behind a chat identity.

use crate::command_helpers::get_member;
use crate::command_router::CommandInvocation;
use crate::plugin_error::PluginError;

pub(crate) async fn run(
    invocation: CommandInvocation,
    args: Vec<String>,
) -> Result<Vec<String>, PluginError> {
    // Rejoin spaced arguments for full-name lookups.
    let lookup = args.join(" ");
    let target = if lookup.is_empty() {
        invocation.nick.clone()
    } else {
        lookup
    };
    let session = invocation.session()?;
    let member = get_member(&session, &invocation.store, &target).await?;
    Ok(vec![format!(
        "{} [{}] ({})",
        member.attr_str("Name").unwrap_or(""),
        member.attr_str("Nickname").unwrap_or(""),
        session.asset_url(&member)
    )])
}
