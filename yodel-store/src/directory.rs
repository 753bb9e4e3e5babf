//! In-memory implementations of the collaborator traits, used by tests and by
//! the standalone binary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use yodel_common::{
    ApiError, ContactPair, DirectoryError, Endpoint, EndpointId, Header, User, UserId,
    traits::{AbTesting, Directory, Permissions, RealtimeNotifier, Shortener},
};

#[derive(Debug, Default)]
pub struct MemoryDirectory {
    users: DashMap<UserId, User>,
    endpoints: DashMap<EndpointId, Endpoint>,
    contacts: DashMap<(UserId, UserId), ContactPair>,
    followers: DashMap<UserId, Vec<UserId>>,
    groups: DashMap<UserId, Vec<UserId>>,
    denied: DashSet<UserId>,
    enrollments: DashMap<(UserId, String), Header>,
}

impl MemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user: User) -> UserId {
        let id = user.id;
        self.users.insert(id, user);
        id
    }

    /// Registers a device.
    ///
    /// Registering a token the owner already has updates that endpoint in
    /// place and re-enables it.
    pub fn register_endpoint(&self, endpoint: Endpoint) -> EndpointId {
        let existing = self
            .endpoints
            .iter()
            .find(|entry| entry.owner == endpoint.owner && entry.token == endpoint.token)
            .map(|entry| *entry.key());

        if let Some(id) = existing {
            if let Some(mut stored) = self.endpoints.get_mut(&id) {
                stored.platform = endpoint.platform;
                stored.app_id = endpoint.app_id;
                stored.app_version = endpoint.app_version;
                stored.os_version = endpoint.os_version;
                stored.is_disabled = false;
            }
            return id;
        }

        let id = endpoint.id;
        self.endpoints.insert(id, endpoint);
        id
    }

    pub fn follow(&self, follower: UserId, user: UserId) {
        let mut followers = self.followers.entry(user).or_default();
        if !followers.contains(&follower) {
            followers.push(follower);
        }
    }

    pub fn set_group(&self, group: UserId, members: Vec<UserId>) {
        self.groups.insert(group, members);
    }

    pub fn set_contact(&self, pair: ContactPair) {
        self.contacts.insert((pair.owner, pair.target), pair);
    }

    /// Revoke `user`'s permission to send
    pub fn deny(&self, user: UserId) {
        self.denied.insert(user);
    }

    pub fn enroll(&self, user: UserId, dimension: impl Into<String>, header: Header) {
        self.enrollments.insert((user, dimension.into()), header);
    }

    pub fn endpoint_snapshot(&self, id: EndpointId) -> Option<Endpoint> {
        self.endpoints.get(&id).map(|entry| entry.clone())
    }

    pub fn user_snapshot(&self, id: UserId) -> Option<User> {
        self.users.get(&id).map(|entry| entry.clone())
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn user(&self, id: UserId) -> Result<User, DirectoryError> {
        self.user_snapshot(id).ok_or(DirectoryError::UnknownUser(id))
    }

    async fn endpoints_for(
        &self,
        user: UserId,
        app_id: Option<&str>,
    ) -> Result<Vec<Endpoint>, DirectoryError> {
        let mut endpoints: Vec<_> = self
            .endpoints
            .iter()
            .filter(|entry| entry.owner == user && entry.serves(app_id))
            .map(|entry| entry.clone())
            .collect();

        endpoints.sort_by_key(|endpoint| endpoint.id);
        Ok(endpoints)
    }

    async fn endpoint(&self, id: EndpointId) -> Result<Endpoint, DirectoryError> {
        self.endpoint_snapshot(id)
            .ok_or(DirectoryError::UnknownEndpoint(id))
    }

    async fn contact_pair(
        &self,
        owner: UserId,
        target: UserId,
    ) -> Result<Option<ContactPair>, DirectoryError> {
        Ok(self
            .contacts
            .get(&(owner, target))
            .map(|entry| entry.clone()))
    }

    async fn followers(&self, user: UserId) -> Result<Vec<UserId>, DirectoryError> {
        Ok(self
            .followers
            .get(&user)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }

    async fn group_members(&self, group: UserId) -> Result<Vec<UserId>, DirectoryError> {
        self.groups
            .get(&group)
            .map(|entry| entry.clone())
            .ok_or(DirectoryError::UnknownUser(group))
    }

    async fn disable_endpoint(&self, id: EndpointId) -> Result<(), DirectoryError> {
        let mut endpoint = self
            .endpoints
            .get_mut(&id)
            .ok_or(DirectoryError::UnknownEndpoint(id))?;
        endpoint.is_disabled = true;
        Ok(())
    }

    async fn touch_contact(
        &self,
        owner: UserId,
        target: UserId,
        at: DateTime<Utc>,
    ) -> Result<(), DirectoryError> {
        self.contacts
            .entry((owner, target))
            .or_insert_with(|| ContactPair::new(owner, target))
            .last_yo_at = Some(at);
        Ok(())
    }

    async fn mark_sms_welcomed(&self, user: UserId) -> Result<bool, DirectoryError> {
        let mut entry = self
            .users
            .get_mut(&user)
            .ok_or(DirectoryError::UnknownUser(user))?;

        Ok(!std::mem::replace(&mut entry.sms_welcomed, true))
    }
}

#[async_trait]
impl Permissions for MemoryDirectory {
    async fn assert_can_send(&self, sender: UserId) -> Result<(), ApiError> {
        if !self.users.contains_key(&sender) {
            return Err(ApiError::UnknownUser(sender));
        }

        if self.denied.contains(&sender) {
            return Err(ApiError::PermissionDenied(sender));
        }

        Ok(())
    }
}

#[async_trait]
impl AbTesting for MemoryDirectory {
    async fn enrolled_header(&self, user: UserId, dimension: &str) -> Option<Header> {
        self.enrollments
            .get(&(user, dimension.to_string()))
            .map(|entry| entry.clone())
    }
}

/// Leaves links untouched
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughShortener;

#[async_trait]
impl Shortener for PassthroughShortener {
    async fn shorten(&self, url: &str) -> String {
        url.to_string()
    }
}

/// Writes realtime events to the log instead of a socket
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl RealtimeNotifier for LoggingNotifier {
    async fn notify(&self, user: UserId, event: &str, payload: serde_json::Value) {
        tracing::debug!(%user, event, %payload, "Realtime notification");
    }
}
