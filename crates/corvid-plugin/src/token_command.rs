//! `token [<code> | forget]`: personal access token management.
//!
//! Replies go privately to the invoking user; tokens never land in a
//! channel.

use crate::command_helpers::random_ack;
use crate::command_router::CommandInvocation;
use crate::credential_resolver::{
    load_credential_record, save_credential_record, CredentialRecord,
};
use crate::plugin_error::PluginError;

const TOKEN_INSTRUCTIONS: &str = "In the tracker, go to your Applications and generate a \
     personal access token, then do \"token <code>\" with the generated code";

pub(crate) async fn run(
    invocation: CommandInvocation,
    args: Vec<String>,
) -> Result<Vec<String>, PluginError> {
    if args.len() > 1 {
        return Err(PluginError::usage("token takes at most one argument"));
    }
    let Some(code) = args.first() else {
        return Ok(vec![TOKEN_INSTRUCTIONS.to_string()]);
    };

    let nick = invocation.nick.as_str();
    let mut record = load_credential_record(&invocation.store, nick)?
        .unwrap_or_else(|| CredentialRecord::for_identity(nick));

    if code == "forget" {
        if record.personal_token.take().is_none() {
            return Ok(vec!["Token was already gone".to_string()]);
        }
    } else {
        record.personal_token = Some(code.clone());
    }
    save_credential_record(&invocation.store, &record)?;
    Ok(vec![random_ack()])
}
