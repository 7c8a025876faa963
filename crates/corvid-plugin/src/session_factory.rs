//! Builds authenticated tracker sessions from resolved credentials.

use std::sync::{Arc, Mutex};

use tracing::debug;

use corvid_core::current_unix_timestamp;
use corvid_tracker::{OauthBroker, TrackerAuth, TrackerSession};

use crate::credential_resolver::ResolvedCredential;
use crate::plugin_config::PluginConfig;
use crate::plugin_error::PluginError;

/// Opens a session for the resolved credential.
///
/// Missing shared-identity settings are a configuration failure, kept
/// distinct from handler runtime errors so operators see "misconfigured"
/// while users get a generic hint.
pub async fn open_session(
    config: &PluginConfig,
    credential: &ResolvedCredential,
) -> Result<TrackerSession, PluginError> {
    if config.tracker_url.is_empty() {
        return Err(PluginError::Config(
            "tracker base URL is not configured".to_string(),
        ));
    }

    let auth = match credential {
        ResolvedCredential::PersonalToken(token) => {
            // The token rides in the password slot, bearer-style; no
            // username verification happens on this path.
            TrackerAuth::Bearer {
                token: token.clone(),
            }
        }
        ResolvedCredential::Delegated(delegated) => {
            let token = if delegated.is_expired(current_unix_timestamp()) {
                let broker_config = config.oauth_broker_config().ok_or_else(|| {
                    PluginError::Config(
                        "delegated credentials present but OAuth client registration is incomplete"
                            .to_string(),
                    )
                })?;
                let broker = OauthBroker::new(broker_config)
                    .map_err(|error| PluginError::Config(error.to_string()))?;
                let grant = broker.refresh(&delegated.refresh_token).await.map_err(|_| {
                    PluginError::quit(
                        "Sorry {nick}, couldn't refresh your delegated credentials, try \"oauth\" again",
                    )
                })?;
                debug!("refreshed delegated access token");
                grant.access_token
            } else {
                delegated.access_token.clone()
            };
            TrackerAuth::Bearer { token }
        }
        ResolvedCredential::ServiceAccount => {
            let (username, password) = config.service_identity().ok_or_else(|| {
                PluginError::Config(
                    "shared service identity is not configured".to_string(),
                )
            })?;
            TrackerAuth::Basic { username, password }
        }
    };

    Ok(TrackerSession::connect(
        &config.tracker_url,
        auth,
        config.request_timeout_ms,
    )?)
}

#[derive(Default)]
/// Cache slot for the shared service-identity session.
///
/// Invalidated only by the reload command; lookups between reloads may
/// observe stale remote metadata.
pub struct SharedSessionCache {
    slot: Mutex<Option<Arc<TrackerSession>>>,
}

impl SharedSessionCache {
    pub fn get(&self) -> Option<Arc<TrackerSession>> {
        self.slot
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }

    pub fn put(&self, session: Arc<TrackerSession>) {
        *self.slot.lock().unwrap_or_else(|err| err.into_inner()) = Some(session);
    }

    pub fn invalidate(&self) {
        *self.slot.lock().unwrap_or_else(|err| err.into_inner()) = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use corvid_tracker::{TrackerAuth, TrackerSession};

    use crate::credential_resolver::ResolvedCredential;
    use crate::plugin_config::parse_plugin_config;
    use crate::plugin_error::PluginError;

    use super::{open_session, SharedSessionCache};

    #[tokio::test]
    async fn functional_service_account_path_requires_shared_identity_settings() {
        let config = parse_plugin_config(r#"tracker_url = "http://tracker.example""#)
            .expect("config");
        let error = open_session(&config, &ResolvedCredential::ServiceAccount)
            .await
            .expect_err("missing shared identity");
        match error {
            PluginError::Config(detail) => assert!(detail.contains("service identity")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn functional_personal_token_path_opens_without_shared_identity() {
        let config = parse_plugin_config(r#"tracker_url = "http://tracker.example""#)
            .expect("config");
        let session = open_session(
            &config,
            &ResolvedCredential::PersonalToken("tok-1".to_string()),
        )
        .await
        .expect("session");
        assert_eq!(session.base_url(), "http://tracker.example");
    }

    #[test]
    fn unit_shared_session_cache_reuses_until_invalidated() {
        let cache = SharedSessionCache::default();
        assert!(cache.get().is_none());

        let session = Arc::new(
            TrackerSession::connect(
                "http://tracker.example",
                TrackerAuth::Bearer {
                    token: "tok".to_string(),
                },
                1_000,
            )
            .expect("connect"),
        );
        cache.put(session.clone());
        let cached = cache.get().expect("cached");
        assert!(Arc::ptr_eq(&session, &cached));

        cache.invalidate();
        assert!(cache.get().is_none());
    }
}
