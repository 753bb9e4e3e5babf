use serde::{Deserialize, Serialize};

use crate::{ids::HeaderId, payload_type::PayloadType};

/// Copy template used to word the push and SMS text of a Yo.
///
/// Templates may reference `{sender}`, `{text}`, `{city}`, `{group}`,
/// `{social}` and `{origin}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub id: HeaderId,
    pub payload_type: PayloadType,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub is_default: bool,
    pub sms: String,
    pub push: String,
    /// Appended after the body and never truncated
    #[serde(default)]
    pub ending: String,
}

impl Header {
    pub fn new(
        payload_type: PayloadType,
        is_group: bool,
        sms: impl Into<String>,
        push: impl Into<String>,
        ending: impl Into<String>,
    ) -> Self {
        Self {
            id: HeaderId::generate(),
            payload_type,
            is_group,
            is_default: false,
            sms: sms.into(),
            push: push.into(),
            ending: ending.into(),
        }
    }

    #[must_use]
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub const fn key(&self) -> (PayloadType, bool) {
        (self.payload_type, self.is_group)
    }

    pub fn matches(&self, payload_type: PayloadType, is_group: bool) -> bool {
        self.key() == (payload_type, is_group)
    }
}
