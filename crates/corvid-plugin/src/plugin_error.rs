use thiserror::Error;

use corvid_tracker::TrackerError;

#[derive(Debug, Error)]
/// Failure taxonomy for command handlers and the dispatch engine.
///
/// `Config`, `Auth`, `Usage`, and `Quit` are terminally converted to chat
/// text by the deferred-reply recovery chain; `NotFound` is converted by
/// handlers into a `Quit` with a user-readable message; anything else
/// propagates out of the deferred unit.
pub enum PluginError {
    #[error("plugin misconfigured: {0}")]
    Config(String),
    #[error("tracker authorization failed")]
    Auth,
    #[error("bad command usage: {0}")]
    Usage(String),
    /// Deliberate early exit carrying a user-facing message template.
    /// `{nick}` and `{channel}` placeholders are substituted at delivery.
    #[error("{0}")]
    Quit(String),
    #[error("no matching object in the tracker")]
    NotFound,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PluginError {
    pub fn usage(cause: impl Into<String>) -> Self {
        Self::Usage(cause.into())
    }

    pub fn quit(template: impl Into<String>) -> Self {
        Self::Quit(template.into())
    }
}

impl From<TrackerError> for PluginError {
    fn from(error: TrackerError) -> Self {
        match error {
            // Transport-level rejections all read as "fix your credentials"
            // to the invoking user.
            TrackerError::Unauthorized
            | TrackerError::Http(_)
            | TrackerError::Status { .. } => PluginError::Auth,
            TrackerError::NotFound => PluginError::NotFound,
            other => PluginError::Other(anyhow::Error::new(other)),
        }
    }
}
