//! File-backed document store for per-user and per-channel plugin state.
//!
//! Documents live in named collections inside one schema-versioned JSON
//! file. The surface is deliberately small: find-one-by-filter, upsert
//! save, and find-and-delete, which is everything the credential, alias,
//! and team settings code needs.

use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::Mutex,
};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use corvid_core::write_text_atomic;

const STORE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreState {
    schema_version: u32,
    #[serde(default)]
    collections: BTreeMap<String, Vec<Value>>,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            schema_version: STORE_SCHEMA_VERSION,
            collections: BTreeMap::new(),
        }
    }
}

/// Equality filter over string-valued document fields.
///
/// Every `(field, value)` pair must match for a document to be selected.
pub type DocFilter<'a> = &'a [(&'a str, &'a str)];

#[derive(Debug)]
pub struct DocStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl DocStore {
    /// Opens the store file, creating an empty state when it does not exist.
    pub fn open(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read store file {}", path.display()))?;
            serde_json::from_str::<StoreState>(&raw)
                .with_context(|| format!("failed to parse store file {}", path.display()))?
        } else {
            StoreState::default()
        };

        if state.schema_version != STORE_SCHEMA_VERSION {
            bail!(
                "unsupported store schema: expected {}, found {}",
                STORE_SCHEMA_VERSION,
                state.schema_version
            );
        }

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Returns the first document in `collection` matching `filter`.
    pub fn find_one(&self, collection: &str, filter: DocFilter<'_>) -> Result<Option<Value>> {
        let state = self.lock_state()?;
        let found = state
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| matches_filter(doc, filter)))
            .cloned();
        Ok(found)
    }

    /// Upserts `doc` into `collection`: the first document matching `filter`
    /// is replaced, otherwise the document is appended. Persists on success.
    pub fn save(&self, collection: &str, filter: DocFilter<'_>, doc: Value) -> Result<()> {
        if !doc.is_object() {
            bail!("store documents must be JSON objects");
        }
        let mut state = self.lock_state()?;
        let docs = state.collections.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|existing| matches_filter(existing, filter)) {
            Some(existing) => *existing = doc,
            None => docs.push(doc),
        }
        self.persist(&state)
    }

    /// Removes and returns the first document matching `filter`.
    pub fn find_and_delete(
        &self,
        collection: &str,
        filter: DocFilter<'_>,
    ) -> Result<Option<Value>> {
        let mut state = self.lock_state()?;
        let Some(docs) = state.collections.get_mut(collection) else {
            return Ok(None);
        };
        let Some(position) = docs.iter().position(|doc| matches_filter(doc, filter)) else {
            return Ok(None);
        };
        let removed = docs.remove(position);
        self.persist(&state)?;
        Ok(Some(removed))
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("store mutex is poisoned"))
    }

    fn persist(&self, state: &StoreState) -> Result<()> {
        let mut payload =
            serde_json::to_string_pretty(state).context("failed to serialize store state")?;
        payload.push('\n');
        write_text_atomic(&self.path, &payload)
            .with_context(|| format!("failed to write store file {}", self.path.display()))
    }
}

fn matches_filter(doc: &Value, filter: DocFilter<'_>) -> bool {
    filter.iter().all(|(field, expected)| {
        doc.get(*field)
            .and_then(Value::as_str)
            .is_some_and(|actual| actual == *expected)
    })
}
