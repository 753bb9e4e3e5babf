use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(
    clippy::struct_excessive_bools,
    reason = "Account flags mirror the stored user record"
)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub display_name: Option<String>,
    pub first_name: Option<String>,
    pub phone: Option<String>,
    /// Reachable by SMS only, has never installed the app
    #[serde(default)]
    pub is_pseudo: bool,
    /// API or integration account rather than a person
    #[serde(default)]
    pub is_service: bool,
    pub callback_url: Option<String>,
    #[serde(default)]
    pub sms_welcomed: bool,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: UserId::generate(),
            username: username.into(),
            display_name: None,
            first_name: None,
            phone: None,
            is_pseudo: false,
            is_service: false,
            callback_url: None,
            sms_welcomed: false,
        }
    }

    /// An SMS-only user known by phone number
    pub fn pseudo(username: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            phone: Some(phone.into()),
            is_pseudo: true,
            ..Self::new(username)
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Display name if one is set, otherwise the username
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.username)
    }
}

/// How `owner` knows `target`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPair {
    pub owner: UserId,
    pub target: UserId,
    /// Name `owner` saved `target` under
    pub contact_name: Option<String>,
    pub muted_until: Option<DateTime<Utc>>,
    pub last_yo_at: Option<DateTime<Utc>>,
}

impl ContactPair {
    pub const fn new(owner: UserId, target: UserId) -> Self {
        Self {
            owner,
            target,
            contact_name: None,
            muted_until: None,
            last_yo_at: None,
        }
    }

    pub fn is_muted(&self, now: DateTime<Utc>) -> bool {
        self.muted_until.is_some_and(|until| until > now)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_name_falls_back_to_username() {
        let user = User::new("ALICE");
        assert_eq!(user.name(), "ALICE");
        assert_eq!(user.clone().with_display_name("Alice B.").name(), "Alice B.");
        assert_eq!(user.with_display_name("  ").name(), "ALICE");
    }

    #[test]
    fn test_mute_window() {
        let now = Utc::now();
        let mut pair = ContactPair::new(UserId::generate(), UserId::generate());
        assert!(!pair.is_muted(now));

        pair.muted_until = Some(now + Duration::hours(1));
        assert!(pair.is_muted(now));

        pair.muted_until = Some(now - Duration::seconds(1));
        assert!(!pair.is_muted(now));
    }
}
