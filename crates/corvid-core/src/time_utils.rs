use anyhow::{Context, Result};
use chrono::DateTime;

/// Returns the current Unix timestamp in seconds.
pub fn current_unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Returns true when `expires_unix` is present and no longer in the future.
pub fn is_expired_unix(expires_unix: Option<u64>, now_unix: u64) -> bool {
    matches!(expires_unix, Some(value) if value <= now_unix)
}

/// Parses an RFC 3339 timestamp into Unix seconds.
///
/// Credential expiry fields are persisted as RFC 3339 strings; instants
/// before the epoch are treated as already expired rather than an error.
pub fn parse_rfc3339_unix(raw: &str) -> Result<u64> {
    let parsed = DateTime::parse_from_rfc3339(raw.trim())
        .with_context(|| format!("failed to parse timestamp '{raw}'"))?;
    Ok(parsed.timestamp().max(0) as u64)
}
