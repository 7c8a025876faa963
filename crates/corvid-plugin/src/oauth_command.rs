//! `oauth [<code> | forget]`: delegated-credential authorization flow.

use chrono::DateTime;
use tracing::debug;

use corvid_tracker::OauthBroker;

use crate::command_helpers::random_ack;
use crate::command_router::CommandInvocation;
use crate::credential_resolver::{
    load_credential_record, save_credential_record, CredentialRecord,
};
use crate::plugin_error::PluginError;

pub(crate) async fn run(
    invocation: CommandInvocation,
    args: Vec<String>,
) -> Result<Vec<String>, PluginError> {
    if args.len() > 1 {
        return Err(PluginError::usage("oauth takes at most one argument"));
    }
    if !invocation.config.oauth_enabled {
        return Ok(vec!["Oauth is not enabled".to_string()]);
    }
    let broker_config = invocation.config.oauth_broker_config().ok_or_else(|| {
        PluginError::Config("oauth is enabled but the client registration is incomplete".to_string())
    })?;
    let broker =
        OauthBroker::new(broker_config).map_err(|error| PluginError::Config(error.to_string()))?;

    let nick = invocation.nick.as_str();
    let Some(code) = args.first() else {
        // Step 1: hand out the authorize link.
        let url = broker
            .authorize_url()
            .map_err(|error| PluginError::Config(error.to_string()))?;
        return Ok(vec![format!(
            "Visit {url} then do \"oauth <code>\" with the generated code"
        )]);
    };

    let mut record = load_credential_record(&invocation.store, nick)?
        .unwrap_or_else(|| CredentialRecord::for_identity(nick));

    if code == "forget" {
        record.oauth_access_token = None;
        record.oauth_refresh_token = None;
        record.oauth_token_expiry = None;
    } else {
        let grant = match broker.exchange_code(code).await {
            Ok(grant) => grant,
            Err(error) => {
                debug!(nick, %error, "oauth code exchange failed");
                return Ok(vec![format!(
                    "Sorry {nick} \"{error}\" happened. Try \"oauth\" again from the start"
                )]);
            }
        };
        record.oauth_access_token = Some(grant.access_token);
        record.oauth_refresh_token = grant.refresh_token;
        record.oauth_token_expiry = DateTime::from_timestamp(grant.expires_unix as i64, 0)
            .map(|expiry| expiry.to_rfc3339());
    }
    save_credential_record(&invocation.store, &record)?;
    Ok(vec![random_ack()])
}

#[cfg(test)]
mod tests {
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;

    use crate::credential_resolver::{load_credential_record, save_credential_record, CredentialRecord};
    use crate::tests::support::{fixture_with_config, lines};

    use super::run;

    fn oauth_config(server: &MockServer) -> String {
        format!(
            r#"
            tracker_url = "{}"
            oauth_enabled = true
            oauth_client_id = "corvid"
            oauth_client_secret = "sssh"
            "#,
            server.base_url()
        )
    }

    #[tokio::test]
    async fn functional_oauth_reports_when_disabled() {
        let server = MockServer::start();
        let fixture = fixture_with_config(&format!(
            r#"tracker_url = "{}""#,
            server.base_url()
        ));
        let replies = run(fixture.invocation("bob"), Vec::new()).await.expect("run");
        assert_eq!(replies, vec!["Oauth is not enabled".to_string()]);
    }

    #[tokio::test]
    async fn functional_bare_oauth_hands_out_the_authorize_link() {
        let server = MockServer::start();
        let fixture = fixture_with_config(&oauth_config(&server));
        let replies = run(fixture.invocation("bob"), Vec::new()).await.expect("run");
        assert_eq!(replies.len(), 1);
        assert!(replies[0].starts_with("Visit "));
        assert!(replies[0].contains("client_id=corvid"));
        assert!(replies[0].ends_with("then do \"oauth <code>\" with the generated code"));
    }

    #[tokio::test]
    async fn functional_code_exchange_stores_the_delegated_triple() {
        let server = MockServer::start();
        server
            .mock(|when, then| {
                when.method(POST)
                    .path("/oauth.v1/token")
                    .body_includes("code=abc123");
                then.status(200).json_body(json!({
                    "access_token": "at-1",
                    "refresh_token": "rt-1",
                    "expires_in": 3600
                }));
            });

        let fixture = fixture_with_config(&oauth_config(&server));
        run(fixture.invocation("bob"), lines(&["abc123"]))
            .await
            .expect("exchange");

        let record = load_credential_record(&fixture.store, "bob")
            .expect("load")
            .expect("present");
        assert_eq!(record.oauth_access_token.as_deref(), Some("at-1"));
        assert_eq!(record.oauth_refresh_token.as_deref(), Some("rt-1"));
        let expiry = record.oauth_token_expiry.expect("expiry");
        assert!(corvid_core::parse_rfc3339_unix(&expiry).is_ok());
    }

    #[tokio::test]
    async fn functional_exchange_failure_points_back_to_the_start_of_the_flow() {
        let server = MockServer::start();
        server
            .mock(|when, then| {
                when.method(POST).path("/oauth.v1/token");
                then.status(400).body("invalid_grant");
            });

        let fixture = fixture_with_config(&oauth_config(&server));
        let replies = run(fixture.invocation("bob"), lines(&["stale"]))
            .await
            .expect("run");
        assert_eq!(replies.len(), 1);
        assert!(replies[0].starts_with("Sorry bob \""));
        assert!(replies[0].ends_with("Try \"oauth\" again from the start"));
    }

    #[tokio::test]
    async fn regression_forget_clears_exactly_the_three_oauth_fields() {
        let server = MockServer::start();
        let fixture = fixture_with_config(&oauth_config(&server));
        let record = CredentialRecord {
            chat_identity: "bob".to_string(),
            personal_token: Some("tok-1".to_string()),
            oauth_access_token: Some("at".to_string()),
            oauth_refresh_token: Some("rt".to_string()),
            oauth_token_expiry: Some("2030-01-01T00:00:00Z".to_string()),
        };
        save_credential_record(&fixture.store, &record).expect("seed");

        run(fixture.invocation("bob"), lines(&["forget"]))
            .await
            .expect("forget");

        let loaded = load_credential_record(&fixture.store, "bob")
            .expect("load")
            .expect("present");
        assert!(loaded.oauth_access_token.is_none());
        assert!(loaded.oauth_refresh_token.is_none());
        assert!(loaded.oauth_token_expiry.is_none());
        // The personal token is not oauth state and survives.
        assert_eq!(loaded.personal_token.as_deref(), Some("tok-1"));
    }
}
