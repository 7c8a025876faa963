use thiserror::Error;

#[derive(Debug, Error)]
/// Failure kinds surfaced by the tracker client and token broker.
pub enum TrackerError {
    #[error("tracker rejected the credentials")]
    Unauthorized,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("tracker returned non-success status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid tracker endpoint: {0}")]
    BadEndpoint(String),
    #[error("no asset matched the query")]
    NotFound,
}
