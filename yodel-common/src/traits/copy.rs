use async_trait::async_trait;

use crate::{
    header::Header,
    ids::{HeaderId, UserId},
    payload_type::PayloadType,
};

/// Read side of A/B test assignment
#[async_trait]
pub trait AbTesting: Send + Sync {
    /// Header `user` is enrolled into for `dimension`, if any
    async fn enrolled_header(&self, user: UserId, dimension: &str) -> Option<Header>;
}

/// Read side of the configured copy headers
#[async_trait]
pub trait HeaderSource: Send + Sync {
    /// The single `is_default` header for `(payload_type, is_group)`
    async fn default_header(&self, payload_type: PayloadType, is_group: bool) -> Option<Header>;

    async fn header(&self, id: HeaderId) -> Option<Header>;
}
