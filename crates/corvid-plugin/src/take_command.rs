//! `take <ticket>`: add yourself to a workitem's owner list.

use serde_json::json;

use crate::command_helpers::{commit_staged, get_member, get_workitem};
use crate::command_router::CommandInvocation;
use crate::plugin_error::PluginError;

pub(crate) async fn run(
    invocation: CommandInvocation,
    args: Vec<String>,
) -> Result<Vec<String>, PluginError> {
    let [number] = args.as_slice() else {
        return Err(PluginError::usage("take needs exactly one ticket number"));
    };
    let session = invocation.session()?;
    let nick = invocation.nick.as_str();

    let workitem = get_workitem(&session, number, &["Owners", "Number"]).await?;
    let member = get_member(&session, &invocation.store, nick).await?;

    let already_owner = workitem
        .attr_list("Owners")
        .iter()
        .any(|owner| owner.as_str() == Some(member.oid.as_str()));
    if already_owner {
        return Ok(vec![format!("Dude {nick}, you already own it!")]);
    }

    // Writing to Owners can only add values.
    commit_staged(
        &invocation.config,
        &session,
        vec![(workitem.oid.clone(), "Owners".to_string(), json!([member.oid]))],
    )
    .await
}

#[cfg(test)]
mod tests {
    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;
    use serde_json::json;

    use crate::plugin_error::PluginError;
    use crate::tests::support::{fixture_with_config, lines};

    use super::run;

    fn writable_config(server: &MockServer) -> String {
        format!(
            r#"
            tracker_url = "{}"
            readonly = false
            "#,
            server.base_url()
        )
    }

    fn mock_workitem_with_owners(server: &MockServer, owners: serde_json::Value) {
        server
            .mock(move |when, then| {
                when.method(GET)
                    .path("/api/asset/Workitem")
                    .query_param("where", "Number='B-0020'");
                then.status(200).json_body(json!({
                    "assets": [{
                        "oid": "Workitem:20",
                        "attributes": {"Number": "B-0020", "Owners": owners}
                    }]
                }));
            });
    }

    fn mock_member(server: &MockServer) {
        server
            .mock(|when, then| {
                when.method(GET).path("/api/asset/Member");
                then.status(200).json_body(json!({
                    "assets": [{
                        "oid": "Member:7",
                        "attributes": {"Name": "Robert", "Nickname": "bob"}
                    }]
                }));
            });
    }

    #[tokio::test]
    async fn functional_take_on_an_owned_ticket_short_circuits_with_zero_mutations() {
        let server = MockServer::start();
        mock_workitem_with_owners(&server, json!(["Member:7", "Member:9"]));
        mock_member(&server);
        let update = server
            .mock(|when, then| {
                when.method(POST).path("/api/asset/Workitem:20");
                then.status(200).json_body(json!({"ok": true}));
            });

        let fixture = fixture_with_config(&writable_config(&server));
        let invocation = fixture.invocation_with_session("bob", &server);
        let replies = run(invocation, lines(&["B-0020"])).await.expect("run");
        assert_eq!(replies, vec!["Dude bob, you already own it!".to_string()]);
        assert_eq!(update.hits(), 0);
    }

    #[tokio::test]
    async fn functional_take_appends_the_member_to_owners_and_commits() {
        let server = MockServer::start();
        mock_workitem_with_owners(&server, json!(["Member:9"]));
        mock_member(&server);
        let update = server
            .mock(|when, then| {
                when.method(POST)
                    .path("/api/asset/Workitem:20")
                    .json_body(json!({
                        "attributes": {"Owners": ["Member:7"]}
                    }));
                then.status(200).json_body(json!({"ok": true}));
            });

        let fixture = fixture_with_config(&writable_config(&server));
        let invocation = fixture.invocation_with_session("bob", &server);
        run(invocation, lines(&["B-0020"])).await.expect("run");
        update.assert();
    }

    #[tokio::test]
    async fn regression_take_without_a_ticket_number_is_a_usage_failure() {
        let server = MockServer::start();
        let fixture = fixture_with_config(&writable_config(&server));
        let invocation = fixture.invocation_with_session("bob", &server);
        let error = run(invocation, Vec::new()).await.expect_err("arity");
        assert!(matches!(error, PluginError::Usage(_)));
    }

    #[tokio::test]
    async fn regression_take_without_a_session_asks_for_auth_setup_material() {
        let server = MockServer::start();
        let fixture = fixture_with_config(&writable_config(&server));
        let invocation = fixture.invocation("bob");
        let error = run(invocation, lines(&["B-0020"])).await.expect_err("no session");
        assert!(matches!(error, PluginError::Usage(_)));
    }
}
