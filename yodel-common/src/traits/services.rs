use async_trait::async_trait;

use crate::{error::ApiError, ids::UserId};

#[async_trait]
pub trait Permissions: Send + Sync {
    /// Fails with [`ApiError::PermissionDenied`] when `sender` may not send
    async fn assert_can_send(&self, sender: UserId) -> Result<(), ApiError>;
}

#[async_trait]
pub trait Shortener: Send + Sync {
    /// Short form of `url`. Implementations hand back `url` unchanged when
    /// shortening is unavailable.
    async fn shorten(&self, url: &str) -> String;
}

/// Pushes events to connected clients. Best effort, failures are swallowed
/// by implementations.
#[async_trait]
pub trait RealtimeNotifier: Send + Sync {
    async fn notify(&self, user: UserId, event: &str, payload: serde_json::Value);
}
