//! `reload`: drop the cached shared-identity session so the next
//! invocation reconnects against fresh remote metadata.

use tracing::debug;

use crate::command_helpers::random_ack;
use crate::command_router::CommandInvocation;
use crate::plugin_error::PluginError;

pub(crate) async fn run(
    invocation: CommandInvocation,
    _args: Vec<String>,
) -> Result<Vec<String>, PluginError> {
    invocation.shared_sessions.invalidate();
    debug!("shared tracker session dropped, next invocation reconnects");
    Ok(vec![random_ack()])
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use corvid_tracker::{TrackerAuth, TrackerSession};

    use crate::tests::support::fixture;

    use super::run;

    #[tokio::test]
    async fn functional_reload_invalidates_the_cached_shared_session() {
        let fixture = fixture();
        let session = Arc::new(
            TrackerSession::connect(
                "http://tracker.example",
                TrackerAuth::Basic {
                    username: "svc".to_string(),
                    password: "hunter2".to_string(),
                },
                1_000,
            )
            .expect("connect"),
        );
        fixture.shared_sessions.put(session);
        assert!(fixture.shared_sessions.get().is_some());

        run(fixture.invocation("bob"), Vec::new()).await.expect("run");
        assert!(fixture.shared_sessions.get().is_none());
    }
}
