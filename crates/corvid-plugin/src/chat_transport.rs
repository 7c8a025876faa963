use async_trait::async_trait;

#[async_trait]
/// Outbound side of the chat system, as seen by this engine.
///
/// `target` is either a channel name or a nick; the transport decides how
/// to route each. Inbound message handling and command tokenization stay
/// with the surrounding chat framework.
pub trait ChatTransport: Send + Sync {
    async fn send_message(&self, target: &str, text: &str) -> anyhow::Result<()>;
}
