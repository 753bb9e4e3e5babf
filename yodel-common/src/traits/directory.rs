use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    endpoint::Endpoint,
    error::DirectoryError,
    ids::{EndpointId, UserId},
    user::{ContactPair, User},
};

/// User, contact and endpoint lookups.
///
/// Apart from the bookkeeping methods at the bottom this is read-only from the
/// point of view of delivery.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn user(&self, id: UserId) -> Result<User, DirectoryError>;

    /// Endpoints registered by `user`, restricted to `app_id` when given.
    /// Disabled endpoints are included; callers decide what to skip.
    async fn endpoints_for(
        &self,
        user: UserId,
        app_id: Option<&str>,
    ) -> Result<Vec<Endpoint>, DirectoryError>;

    async fn endpoint(&self, id: EndpointId) -> Result<Endpoint, DirectoryError>;

    async fn contact_pair(
        &self,
        owner: UserId,
        target: UserId,
    ) -> Result<Option<ContactPair>, DirectoryError>;

    /// Everyone who receives `user`'s broadcasts
    async fn followers(&self, user: UserId) -> Result<Vec<UserId>, DirectoryError>;

    async fn group_members(&self, group: UserId) -> Result<Vec<UserId>, DirectoryError>;

    /// Logically disable an endpoint. Endpoints are never deleted.
    async fn disable_endpoint(&self, id: EndpointId) -> Result<(), DirectoryError>;

    /// Record that `owner` received a Yo from `target` at `at`
    async fn touch_contact(
        &self,
        owner: UserId,
        target: UserId,
        at: DateTime<Utc>,
    ) -> Result<(), DirectoryError>;

    /// Flag `user` as having received the welcome SMS.
    ///
    /// Returns `true` only for the call that actually set the flag.
    async fn mark_sms_welcomed(&self, user: UserId) -> Result<bool, DirectoryError>;
}
