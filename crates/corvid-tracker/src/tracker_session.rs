//! Authenticated tracker session with buffered writes.

use std::{
    collections::BTreeMap,
    sync::Mutex,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tracker_error::TrackerError;

#[derive(Debug, Clone)]
/// How requests against the tracker are authenticated.
pub enum TrackerAuth {
    /// Shared service identity, username/password.
    Basic { username: String, password: String },
    /// Personal access token or delegated OAuth access token.
    Bearer { token: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// One tracker asset: an opaque oid plus a flat attribute map.
pub struct Asset {
    pub oid: String,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

impl Asset {
    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }

    pub fn attr_f64(&self, name: &str) -> Option<f64> {
        self.attributes.get(name).and_then(Value::as_f64)
    }

    pub fn attr_list(&self, name: &str) -> Vec<Value> {
        self.attributes
            .get(name)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct AssetListResponse {
    #[serde(default)]
    assets: Vec<Asset>,
}

#[derive(Debug, Clone, Default)]
/// OR-joined equality filter, rendered as `Field='value'|Field='value'`.
pub struct Filter {
    clauses: Vec<String>,
}

impl Filter {
    pub fn eq(field: &str, value: &str) -> Self {
        Self::default().or_eq(field, value)
    }

    pub fn or_eq(mut self, field: &str, value: &str) -> Self {
        self.clauses
            .push(format!("{}='{}'", field, escape_filter_value(value)));
        self
    }

    /// One field OR-matched against every value, as batched lookups need.
    pub fn any_eq<'a>(field: &str, values: impl IntoIterator<Item = &'a str>) -> Self {
        values
            .into_iter()
            .fold(Self::default(), |filter, value| filter.or_eq(field, value))
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    fn render(&self) -> String {
        self.clauses.join("|")
    }
}

fn escape_filter_value(value: &str) -> String {
    value.replace('\'', "''")
}

#[derive(Debug)]
struct PendingUpdate {
    oid: String,
    field: String,
    value: Value,
}

/// A live, authenticated handle to the tracker.
///
/// Field mutations are buffered in a dirty list and only sent by
/// `commit`; queries and creation go straight to the wire.
#[derive(Debug)]
pub struct TrackerSession {
    http: reqwest::Client,
    base_url: String,
    auth: TrackerAuth,
    pending: Mutex<Vec<PendingUpdate>>,
}

impl TrackerSession {
    pub fn connect(
        base_url: &str,
        auth: TrackerAuth,
        request_timeout_ms: u64,
    ) -> Result<Self, TrackerError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("corvid-tracker"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            pending: Mutex::new(Vec::new()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Starts a kind-scoped query (`Workitem`, `Member`, `Team`, ...).
    pub fn query(&self, kind: &str) -> AssetQuery<'_> {
        AssetQuery {
            session: self,
            kind: kind.to_string(),
            filter: None,
            select: Vec::new(),
        }
    }

    /// Display URL for an asset; falls back to an oid-derived link when the
    /// tracker did not send one.
    pub fn asset_url(&self, asset: &Asset) -> String {
        asset
            .href
            .clone()
            .unwrap_or_else(|| format!("{}/asset/{}", self.base_url, asset.oid))
    }

    /// Records a field update without touching the wire.
    pub fn stage_update(&self, oid: &str, field: &str, value: Value) {
        let mut pending = self.pending.lock().unwrap_or_else(|err| err.into_inner());
        pending.push(PendingUpdate {
            oid: oid.to_string(),
            field: field.to_string(),
            value,
        });
    }

    /// Flushes staged updates, one request per asset, in staging order.
    /// With nothing staged this is a no-op.
    pub async fn commit(&self) -> Result<(), TrackerError> {
        let staged = {
            let mut pending = self.pending.lock().unwrap_or_else(|err| err.into_inner());
            std::mem::take(&mut *pending)
        };
        if staged.is_empty() {
            return Ok(());
        }

        let mut per_asset: Vec<(String, BTreeMap<String, Value>)> = Vec::new();
        for update in staged {
            match per_asset.iter_mut().find(|(oid, _)| *oid == update.oid) {
                Some((_, attributes)) => {
                    attributes.insert(update.field, update.value);
                }
                None => {
                    let mut attributes = BTreeMap::new();
                    attributes.insert(update.field, update.value);
                    per_asset.push((update.oid, attributes));
                }
            }
        }

        for (oid, attributes) in per_asset {
            let response = self
                .apply_auth(
                    self.http
                        .post(format!("{}/api/asset/{}", self.base_url, oid)),
                )
                .json(&serde_json::json!({ "attributes": attributes }))
                .send()
                .await?;
            Self::require_success(response).await?;
        }
        Ok(())
    }

    /// Creates an asset immediately and returns the created object.
    pub async fn create(
        &self,
        kind: &str,
        attributes: BTreeMap<String, Value>,
    ) -> Result<Asset, TrackerError> {
        let response = self
            .apply_auth(
                self.http
                    .post(format!("{}/api/asset/{}", self.base_url, kind)),
            )
            .json(&serde_json::json!({ "attributes": attributes }))
            .send()
            .await?;
        let response = Self::require_success(response).await?;
        response
            .json::<Asset>()
            .await
            .map_err(|error| TrackerError::InvalidResponse(error.to_string()))
    }

    async fn fetch_assets(
        &self,
        kind: &str,
        filter: Option<&Filter>,
        select: &[String],
    ) -> Result<Vec<Asset>, TrackerError> {
        let mut request = self
            .http
            .get(format!("{}/api/asset/{}", self.base_url, kind));
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            request = request.query(&[("where", filter.render())]);
        }
        if !select.is_empty() {
            request = request.query(&[("sel", select.join(","))]);
        }
        let response = self.apply_auth(request).send().await?;
        let response = Self::require_success(response).await?;
        let parsed = response
            .json::<AssetListResponse>()
            .await
            .map_err(|error| TrackerError::InvalidResponse(error.to_string()))?;
        Ok(parsed.assets)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            TrackerAuth::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
            TrackerAuth::Bearer { token } => request.bearer_auth(token),
        }
    }

    async fn require_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, TrackerError> {
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
        Ok(response)
    }
}

/// Builder for one kind-scoped query.
pub struct AssetQuery<'a> {
    session: &'a TrackerSession,
    kind: String,
    filter: Option<Filter>,
    select: Vec<String>,
}

impl AssetQuery<'_> {
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn select<'f>(mut self, fields: impl IntoIterator<Item = &'f str>) -> Self {
        self.select
            .extend(fields.into_iter().map(str::to_string));
        self
    }

    pub async fn fetch(self) -> Result<Vec<Asset>, TrackerError> {
        self.session
            .fetch_assets(&self.kind, self.filter.as_ref(), &self.select)
            .await
    }

    /// First matching asset, `NotFound` when the query comes back empty.
    pub async fn first(self) -> Result<Asset, TrackerError> {
        let mut assets = self.fetch().await?;
        if assets.is_empty() {
            return Err(TrackerError::NotFound);
        }
        Ok(assets.remove(0))
    }
}
