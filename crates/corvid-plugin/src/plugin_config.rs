//! Plugin configuration loaded from TOML.

use std::{collections::BTreeMap, path::Path};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use corvid_tracker::OauthBrokerConfig;

#[derive(Debug, Clone, Deserialize)]
/// Settings for the tracker connection, auth flows, and command behavior.
pub struct PluginConfig {
    /// Base URL of the tracker instance, no trailing slash.
    pub tracker_url: String,
    #[serde(default)]
    pub service_username: Option<String>,
    #[serde(default)]
    pub service_password: Option<String>,
    #[serde(default)]
    pub oauth_enabled: bool,
    #[serde(default)]
    pub oauth_client_id: Option<String>,
    #[serde(default)]
    pub oauth_client_secret: Option<String>,
    #[serde(default = "default_oauth_redirect_uri")]
    pub oauth_redirect_uri: String,
    /// Write-access gate: while true every mutating command is refused.
    #[serde(default = "default_readonly")]
    pub readonly: bool,
    /// Candidate field names probed, in order, by the review command.
    #[serde(default)]
    pub review_fields: Vec<String>,
    /// Ticket prefixes recognized by passive matching.
    #[serde(default = "default_known_prefixes")]
    pub known_prefixes: Vec<String>,
    /// Prefixes that resolve to a non-default entity kind.
    #[serde(default = "default_special_kinds")]
    pub special_kinds: BTreeMap<String, String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_oauth_redirect_uri() -> String {
    // Out-of-band flow; the user pastes the code back into chat.
    "urn:ietf:wg:oauth:2.0:oob".to_string()
}

fn default_readonly() -> bool {
    true
}

fn default_known_prefixes() -> Vec<String> {
    ["B", "D", "TK", "AT", "FG", "I", "R", "E"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_special_kinds() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("I".to_string(), "Issue".to_string()),
        ("R".to_string(), "Request".to_string()),
    ])
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

impl PluginConfig {
    /// Shared service identity, when both halves are configured.
    pub fn service_identity(&self) -> Option<(String, String)> {
        let username = non_empty(self.service_username.as_deref())?;
        let password = non_empty(self.service_password.as_deref())?;
        Some((username, password))
    }

    /// Token-broker settings, when the OAuth client registration is complete.
    pub fn oauth_broker_config(&self) -> Option<OauthBrokerConfig> {
        let client_id = non_empty(self.oauth_client_id.as_deref())?;
        let client_secret = non_empty(self.oauth_client_secret.as_deref())?;
        Some(OauthBrokerConfig {
            client_id,
            client_secret,
            redirect_uri: self.oauth_redirect_uri.clone(),
            auth_url: format!("{}/oauth.v1/auth", self.tracker_url),
            token_url: format!("{}/oauth.v1/token", self.tracker_url),
            scope: "apiv1".to_string(),
        })
    }
}

fn non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Loads and normalizes plugin configuration from a TOML file.
pub fn load_plugin_config(path: &Path) -> Result<PluginConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    parse_plugin_config(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

pub(crate) fn parse_plugin_config(raw: &str) -> Result<PluginConfig> {
    let mut config: PluginConfig = toml::from_str(raw).context("invalid plugin config")?;
    config.tracker_url = config.tracker_url.trim().trim_end_matches('/').to_string();
    if config.tracker_url.is_empty() {
        bail!("tracker_url must not be empty");
    }
    Ok(config)
}
