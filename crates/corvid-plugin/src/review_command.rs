//! `review|cr <ticket> [!]<text>`: show, append to, or replace the code
//! review field on a workitem.

use serde_json::json;
use tracing::debug;

use corvid_tracker::Asset;

use crate::command_helpers::{commit_staged, get_workitem};
use crate::command_router::CommandInvocation;
use crate::plugin_error::PluginError;

/// Probes the configured candidate field names in order and returns the
/// first one present on the asset, with its current value.
///
/// A field that is present but null counts as an empty review link, not a
/// miss.
fn probe_review_field<'a>(candidates: &'a [String], asset: &Asset) -> Option<(String, &'a str)> {
    candidates.iter().find_map(|field| {
        asset.attributes.get(field).map(|value| {
            let link = value.as_str().unwrap_or("").to_string();
            (link, field.as_str())
        })
    })
}

pub(crate) async fn run(
    invocation: CommandInvocation,
    args: Vec<String>,
) -> Result<Vec<String>, PluginError> {
    let (number, text_args) = args
        .split_first()
        .ok_or_else(|| PluginError::usage("review needs a ticket number"))?;
    let session = invocation.session()?;
    let nick = invocation.nick.as_str();

    let workitem = get_workitem(&session, number, &[]).await?;
    let Some((link, field)) = probe_review_field(&invocation.config.review_fields, &workitem)
    else {
        return Ok(vec![format!(
            "I'm sorry {nick}, item \"{number}\" doesn't support reviews"
        )]);
    };

    if text_args.is_empty() {
        let shown = if link.is_empty() { "(None)" } else { link.as_str() };
        return Ok(vec![format!("{number} Reviews: {shown}")]);
    }

    let mut text = text_args.join(" ");
    let new_link = if let Some(replacement) = text.strip_prefix('!') {
        text = replacement.to_string();
        Some(text)
    } else if !link.contains(&text) {
        Some(format!("{link} {text}").trim().to_string())
    } else {
        None
    };

    let Some(new_link) = new_link else {
        return Ok(vec![format!("Already got that one {nick}")]);
    };

    debug!(%number, %field, %new_link, "updating review field");
    commit_staged(
        &invocation.config,
        &session,
        vec![(workitem.oid.clone(), field.to_string(), json!(new_link))],
    )
    .await
}

#[cfg(test)]
mod tests {
    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;
    use serde_json::json;

    use crate::command_helpers::READONLY_REFUSAL;
    use crate::plugin_error::PluginError;
    use crate::tests::support::{fixture_with_config, lines};

    use super::run;

    fn review_config(server: &MockServer, readonly: bool) -> String {
        format!(
            r#"
            tracker_url = "{}"
            readonly = {readonly}
            review_fields = ["CodeReview", "Custom_CodeReview"]
            "#,
            server.base_url()
        )
    }

    fn mock_workitem(server: &MockServer, attributes: serde_json::Value) {
        server
            .mock(move |when, then| {
                when.method(GET)
                    .path("/api/asset/Workitem")
                    .query_param("where", "Number='B-0010'");
                then.status(200).json_body(json!({
                    "assets": [{
                        "oid": "Workitem:42",
                        "href": "http://x/1",
                        "attributes": attributes
                    }]
                }));
            });
    }

    #[tokio::test]
    async fn functional_bare_review_shows_the_current_link_or_none() {
        let server = MockServer::start();
        mock_workitem(&server, json!({"Number": "B-0010", "CodeReview": null}));

        let fixture = fixture_with_config(&review_config(&server, true));
        let invocation = fixture.invocation_with_session("bob", &server);
        let replies = run(invocation, lines(&["B-0010"])).await.expect("run");
        assert_eq!(replies, vec!["B-0010 Reviews: (None)".to_string()]);
    }

    #[tokio::test]
    async fn functional_probe_falls_through_to_the_second_candidate_field() {
        let server = MockServer::start();
        mock_workitem(
            &server,
            json!({"Number": "B-0010", "Custom_CodeReview": "http://cr/1"}),
        );

        let fixture = fixture_with_config(&review_config(&server, true));
        let invocation = fixture.invocation_with_session("bob", &server);
        let replies = run(invocation, lines(&["B-0010"])).await.expect("run");
        assert_eq!(replies, vec!["B-0010 Reviews: http://cr/1".to_string()]);
    }

    #[tokio::test]
    async fn functional_no_candidate_field_reports_reviews_unsupported() {
        let server = MockServer::start();
        mock_workitem(&server, json!({"Number": "B-0010"}));

        let fixture = fixture_with_config(&review_config(&server, true));
        let invocation = fixture.invocation_with_session("bob", &server);
        let replies = run(invocation, lines(&["B-0010"])).await.expect("run");
        assert_eq!(
            replies,
            vec!["I'm sorry bob, item \"B-0010\" doesn't support reviews".to_string()]
        );
    }

    #[tokio::test]
    async fn functional_identical_text_is_idempotent_with_zero_mutations() {
        let server = MockServer::start();
        mock_workitem(
            &server,
            json!({"Number": "B-0010", "CodeReview": "http://cr/1"}),
        );
        let update = server
            .mock(|when, then| {
                when.method(POST).path("/api/asset/Workitem:42");
                then.status(200).json_body(json!({"ok": true}));
            });

        let fixture = fixture_with_config(&review_config(&server, false));
        let invocation = fixture.invocation_with_session("bob", &server);
        let replies = run(invocation, lines(&["B-0010", "http://cr/1"]))
            .await
            .expect("run");
        assert_eq!(replies, vec!["Already got that one bob".to_string()]);
        assert_eq!(update.hits(), 0);
    }

    #[tokio::test]
    async fn functional_append_commits_the_joined_link() {
        let server = MockServer::start();
        mock_workitem(
            &server,
            json!({"Number": "B-0010", "CodeReview": "http://cr/1"}),
        );
        let update = server
            .mock(|when, then| {
                when.method(POST)
                    .path("/api/asset/Workitem:42")
                    .json_body(json!({
                        "attributes": {"CodeReview": "http://cr/1 http://cr/2"}
                    }));
                then.status(200).json_body(json!({"ok": true}));
            });

        let fixture = fixture_with_config(&review_config(&server, false));
        let invocation = fixture.invocation_with_session("bob", &server);
        run(invocation, lines(&["B-0010", "http://cr/2"]))
            .await
            .expect("run");
        update.assert();
    }

    #[tokio::test]
    async fn functional_bang_prefix_replaces_instead_of_appending() {
        let server = MockServer::start();
        mock_workitem(
            &server,
            json!({"Number": "B-0010", "CodeReview": "http://cr/1"}),
        );
        let update = server
            .mock(|when, then| {
                when.method(POST)
                    .path("/api/asset/Workitem:42")
                    .json_body(json!({
                        "attributes": {"CodeReview": "http://cr/9"}
                    }));
                then.status(200).json_body(json!({"ok": true}));
            });

        let fixture = fixture_with_config(&review_config(&server, false));
        let invocation = fixture.invocation_with_session("bob", &server);
        run(invocation, lines(&["B-0010", "!http://cr/9"]))
            .await
            .expect("run");
        update.assert();
    }

    #[tokio::test]
    async fn regression_write_gate_refuses_the_append_without_touching_the_wire() {
        let server = MockServer::start();
        mock_workitem(
            &server,
            json!({"Number": "B-0010", "CodeReview": "http://cr/1"}),
        );
        let update = server
            .mock(|when, then| {
                when.method(POST).path("/api/asset/Workitem:42");
                then.status(200).json_body(json!({"ok": true}));
            });

        let fixture = fixture_with_config(&review_config(&server, true));
        let invocation = fixture.invocation_with_session("bob", &server);
        let replies = run(invocation, lines(&["B-0010", "http://cr/2"]))
            .await
            .expect("run");
        assert_eq!(replies, vec![READONLY_REFUSAL.to_string()]);
        assert_eq!(update.hits(), 0);
    }

    #[tokio::test]
    async fn regression_missing_ticket_number_is_a_usage_failure() {
        let server = MockServer::start();
        let fixture = fixture_with_config(&review_config(&server, true));
        let invocation = fixture.invocation_with_session("bob", &server);
        let error = run(invocation, Vec::new()).await.expect_err("arity");
        assert!(matches!(error, PluginError::Usage(_)));
    }
}
