use async_trait::async_trait;
use serde_json::Value;

use crate::Result;

/// Callback invoked for every message a subscription receives
pub type MessageHandler = Box<dyn Fn(Value) + Send + Sync>;

/// The pub/sub subsystem collection change feeds delegate to
///
/// Implementations own their websocket connections; the collection only
/// names the stream, the subscription and the data center to consume from.
#[async_trait]
pub trait StreamClient: Send + Sync {
    async fn consumer(
        &self,
        stream: &str,
        subscription: &str,
        dc_name: &str,
        handler: MessageHandler,
    ) -> Result<()>;

    async fn close_ws_connections(&self) -> Result<()>;
}
