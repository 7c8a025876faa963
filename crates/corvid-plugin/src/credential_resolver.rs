//! Per-user credential records and the resolution policy that picks the
//! tracker identity for an invocation.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use corvid_core::{is_expired_unix, parse_rfc3339_unix};
use corvid_store::DocStore;

use crate::plugin_config::PluginConfig;
use crate::plugin_error::PluginError;

pub(crate) const CREDENTIALS_COLLECTION: &str = "credentials";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// Stored auth material for one chat identity.
pub struct CredentialRecord {
    pub chat_identity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_refresh_token: Option<String>,
    /// RFC 3339 expiry of the delegated access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_token_expiry: Option<String>,
}

impl CredentialRecord {
    pub fn for_identity(chat_identity: &str) -> Self {
        Self {
            chat_identity: chat_identity.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
/// OAuth token set delegated to the plugin on behalf of one chat user.
pub struct DelegatedCredential {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_unix: u64,
}

impl DelegatedCredential {
    pub fn is_expired(&self, now_unix: u64) -> bool {
        is_expired_unix(Some(self.expires_unix), now_unix)
    }
}

#[derive(Debug, Clone)]
/// Which tracker identity an invocation runs under.
pub enum ResolvedCredential {
    PersonalToken(String),
    Delegated(DelegatedCredential),
    /// No per-user credential: fall back to the shared service identity.
    ServiceAccount,
}

/// Truncates away-marker and multi-session suffixes so `bob|away` and
/// `bob_laptop` share the credential records stored under `bob`.
pub fn normalize_chat_identity(raw: &str) -> &str {
    if let Some((head, _)) = raw.split_once('|') {
        head.trim()
    } else if let Some((head, _)) = raw.split_once('_') {
        head.trim()
    } else {
        raw
    }
}

pub fn load_credential_record(
    store: &DocStore,
    chat_identity: &str,
) -> Result<Option<CredentialRecord>> {
    let Some(doc) = store.find_one(CREDENTIALS_COLLECTION, &[("chat_identity", chat_identity)])?
    else {
        return Ok(None);
    };
    let record = serde_json::from_value(doc).context("malformed credential record")?;
    Ok(Some(record))
}

pub fn save_credential_record(store: &DocStore, record: &CredentialRecord) -> Result<()> {
    store.save(
        CREDENTIALS_COLLECTION,
        &[("chat_identity", &record.chat_identity)],
        serde_json::to_value(record).context("failed to encode credential record")?,
    )
}

/// Resolves the tracker identity for `chat_identity`.
///
/// Absence of any credential is not an error; it selects the shared
/// service identity. Present-but-unusable delegated credentials surface a
/// re-authorize condition instead of silently falling through.
pub fn resolve_credentials(
    store: &DocStore,
    config: &PluginConfig,
    chat_identity: &str,
) -> Result<ResolvedCredential, PluginError> {
    let record = match load_credential_record(store, chat_identity)? {
        Some(record) => Some(record),
        None => load_credential_record(store, normalize_chat_identity(chat_identity))?,
    };
    let Some(record) = record else {
        return Ok(ResolvedCredential::ServiceAccount);
    };

    // Personal token wins over delegated credentials.
    if let Some(token) = record
        .personal_token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
    {
        return Ok(ResolvedCredential::PersonalToken(token.to_string()));
    }

    if config.oauth_enabled {
        if let (Some(access_token), Some(refresh_token), Some(expiry)) = (
            record.oauth_access_token.as_deref(),
            record.oauth_refresh_token.as_deref(),
            record.oauth_token_expiry.as_deref(),
        ) {
            let expires_unix = match parse_rfc3339_unix(expiry) {
                Ok(value) => value,
                Err(error) => {
                    warn!(
                        chat_identity,
                        %error,
                        "stored delegated credentials are unusable"
                    );
                    return Err(PluginError::quit(
                        "Sorry {nick}, couldn't get your delegated credentials, try \"oauth\" again",
                    ));
                }
            };
            return Ok(ResolvedCredential::Delegated(DelegatedCredential {
                access_token: access_token.to_string(),
                refresh_token: refresh_token.to_string(),
                expires_unix,
            }));
        }
    }

    // A record mid-setup, with neither token nor a complete OAuth triple,
    // resolves the same as no record at all.
    Ok(ResolvedCredential::ServiceAccount)
}
