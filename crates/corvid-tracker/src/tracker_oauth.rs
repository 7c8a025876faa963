//! OAuth2 token-broker client: authorize-URL construction and code exchange.

use std::time::Duration;

use serde::Deserialize;

use corvid_core::current_unix_timestamp;

use crate::tracker_error::TrackerError;

#[derive(Debug, Clone)]
/// Broker endpoints and client registration from plugin configuration.
pub struct OauthBrokerConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub scope: String,
}

#[derive(Debug, Clone)]
/// Result of a successful code exchange or refresh.
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_unix: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

pub struct OauthBroker {
    http: reqwest::Client,
    config: OauthBrokerConfig,
}

impl OauthBroker {
    pub fn new(config: OauthBrokerConfig) -> Result<Self, TrackerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(15_000))
            .build()?;
        Ok(Self { http, config })
    }

    /// Step-1 URL the user visits to authorize the plugin.
    pub fn authorize_url(&self) -> Result<String, TrackerError> {
        let url = reqwest::Url::parse_with_params(
            &self.config.auth_url,
            &[
                ("response_type", "code"),
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("scope", self.config.scope.as_str()),
            ],
        )
        .map_err(|error| TrackerError::BadEndpoint(error.to_string()))?;
        Ok(url.to_string())
    }

    /// Step-2 exchange of the pasted authorization code for a token set.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant, TrackerError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ])
        .await
    }

    /// Exchanges a refresh token for a fresh access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, TrackerError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ])
        .await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenGrant, TrackerError> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(form)
            .send()
            .await?;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(TrackerError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrackerError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let parsed = response
            .json::<TokenEndpointResponse>()
            .await
            .map_err(|error| TrackerError::InvalidResponse(error.to_string()))?;
        if parsed.access_token.trim().is_empty() {
            return Err(TrackerError::InvalidResponse(
                "token endpoint returned an empty access_token".to_string(),
            ));
        }
        Ok(TokenGrant {
            access_token: parsed.access_token,
            refresh_token: parsed.refresh_token,
            expires_unix: current_unix_timestamp()
                .saturating_add(parsed.expires_in.unwrap_or(0)),
        })
    }
}
