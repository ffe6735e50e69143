use async_trait::async_trait;
use location_bridge_shared::{InitializeDatabaseArgs, SaveLocationArgs};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("no callback registered for handle {0}")]
    CallbackNotFound(i64),

    #[error("failed to reach runtime at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("runtime has been released")]
    Released,

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Named-method channel into the embedded application runtime.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn initialize(&self, args: &InitializeDatabaseArgs) -> Result<(), RuntimeError>;

    async fn save_location(&self, args: &SaveLocationArgs) -> Result<(), RuntimeError>;

    /// Release the runtime behind this sink.
    async fn shutdown(&self) {}
}

/// Boots the embedded runtime a callback handle refers to.
#[async_trait]
pub trait RuntimeHost: Send + Sync {
    async fn launch(&self, callback_handle: i64) -> Result<Arc<dyn MessageSink>, RuntimeError>;
}
