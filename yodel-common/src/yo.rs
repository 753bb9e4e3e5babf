use core::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    ids::{HeaderId, UserId, YoId},
};

/// Delivery state of a Yo.
///
/// `pending → started → sending → sent | failed`, with `scheduled` taking the
/// place of `pending` for time-deferred sends. `sent` and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum YoStatus {
    #[default]
    Pending,
    Scheduled,
    Started,
    Sending,
    Sent,
    Failed,
}

impl YoStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Scheduled => "scheduled",
            Self::Started => "started",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }
}

impl Display for YoStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown yo status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for YoStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "scheduled" => Ok(Self::Scheduled),
            "started" => Ok(Self::Started),
            "sending" => Ok(Self::Sending),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{};{}", self.lat, self.lng)
    }
}

/// Two-choice interactive reply, rendered as `"left.right"` categories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePair {
    pub left: String,
    pub right: String,
}

impl ResponsePair {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn category(&self) -> String {
        format!("{}.{}", self.left, self.right)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YoContent {
    pub link: Option<String>,
    /// MIME type of whatever `link` points at
    pub link_content_type: Option<String>,
    pub location: Option<Location>,
    pub city: Option<String>,
    pub text: Option<String>,
    /// Uploaded photo URL
    pub photo: Option<String>,
    pub cover: Option<String>,
}

impl YoContent {
    pub fn has_text(&self) -> bool {
        self.text.as_deref().is_some_and(|text| !text.trim().is_empty())
    }

    pub fn has_link(&self) -> bool {
        self.link.as_deref().is_some_and(|link| !link.is_empty())
    }

    pub const fn has_location(&self) -> bool {
        self.location.is_some()
    }

    /// Rejects content combinations a client can't render
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.link.is_some() && self.location.is_some() {
            return Err(ApiError::InvalidContent("link", "location"));
        }

        if self.cover.is_some() && self.photo.is_some() {
            return Err(ApiError::InvalidContent("cover", "photo"));
        }

        if self.cover.is_some() && self.location.is_some() {
            return Err(ApiError::InvalidContent("cover", "location"));
        }

        Ok(())
    }
}

/// A single logical message.
///
/// A Yo addressed to more than one person (broadcast, group or a recipient
/// list) is a parent: it is never delivered itself, instead fan-out creates
/// one child per concrete recipient and each child carries its own status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Yo {
    pub id: YoId,
    pub sender: Option<UserId>,
    pub recipient: Option<UserId>,
    /// Multi-recipient send without a real group
    #[serde(default)]
    pub recipients: Vec<UserId>,
    pub group: Option<UserId>,
    #[serde(default)]
    pub is_broadcast: bool,
    pub parent: Option<YoId>,
    pub reply_to: Option<YoId>,
    /// Yo this one forwards
    pub origin_yo: Option<YoId>,
    #[serde(default)]
    pub content: YoContent,
    /// Header explicitly picked by the sender
    pub header: Option<HeaderId>,
    pub response_pair: Option<ResponsePair>,
    pub left_link: Option<String>,
    pub right_link: Option<String>,
    #[serde(default)]
    pub is_poll: bool,
    /// Never fall back to SMS
    #[serde(default)]
    pub is_push_only: bool,
    pub app_id: Option<String>,
    #[serde(default)]
    pub status: YoStatus,
    #[serde(default)]
    pub recipient_count: u64,
    #[serde(default)]
    pub sent_count: u64,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub schedule_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub user_ip: Option<String>,
}

impl Yo {
    fn blank(sender: UserId) -> Self {
        Self {
            id: YoId::generate(),
            sender: Some(sender),
            recipient: None,
            recipients: Vec::new(),
            group: None,
            is_broadcast: false,
            parent: None,
            reply_to: None,
            origin_yo: None,
            content: YoContent::default(),
            header: None,
            response_pair: None,
            left_link: None,
            right_link: None,
            is_poll: false,
            is_push_only: false,
            app_id: None,
            status: YoStatus::Pending,
            recipient_count: 0,
            sent_count: 0,
            scheduled_for: None,
            schedule_name: None,
            created_at: Utc::now(),
            user_ip: None,
        }
    }

    pub fn to(sender: UserId, recipient: UserId) -> Self {
        Self {
            recipient: Some(recipient),
            ..Self::blank(sender)
        }
    }

    pub fn to_many(sender: UserId, recipients: Vec<UserId>) -> Self {
        Self {
            recipients,
            ..Self::blank(sender)
        }
    }

    pub fn to_group(sender: UserId, group: UserId) -> Self {
        Self {
            group: Some(group),
            ..Self::blank(sender)
        }
    }

    /// A Yo to every follower of `sender`
    pub fn broadcast(sender: UserId) -> Self {
        Self {
            is_broadcast: true,
            ..Self::blank(sender)
        }
    }

    #[must_use]
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.content.link = Some(link.into());
        self
    }

    #[must_use]
    pub fn with_link_content_type(mut self, mime: impl Into<String>) -> Self {
        self.content.link_content_type = Some(mime.into());
        self
    }

    #[must_use]
    pub fn with_location(mut self, lat: f64, lng: f64) -> Self {
        self.content.location = Some(Location { lat, lng });
        self
    }

    #[must_use]
    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.content.city = Some(city.into());
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.content.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn with_photo(mut self, photo: impl Into<String>) -> Self {
        self.content.photo = Some(photo.into());
        self
    }

    #[must_use]
    pub fn with_response_pair(mut self, pair: ResponsePair) -> Self {
        self.response_pair = Some(pair);
        self
    }

    #[must_use]
    pub fn push_only(mut self) -> Self {
        self.is_push_only = true;
        self
    }

    #[must_use]
    pub fn scheduled(mut self, at: DateTime<Utc>, schedule: impl Into<String>) -> Self {
        self.scheduled_for = Some(at);
        self.schedule_name = Some(schedule.into());
        self.status = YoStatus::Scheduled;
        self
    }

    /// Group sends, including the legacy recipient-list form
    pub const fn is_group_yo(&self) -> bool {
        self.group.is_some() || self.recipients.len() > 1
    }

    /// A recipient list sent without a real group behind it
    pub const fn is_legacy_group(&self) -> bool {
        self.group.is_none() && self.recipients.len() > 1
    }

    /// Whether this Yo must be expanded into children rather than delivered
    pub const fn needs_fanout(&self) -> bool {
        self.is_broadcast || self.is_group_yo()
    }

    /// Single recipient, if this Yo has exactly one
    pub fn single_recipient(&self) -> Option<UserId> {
        self.recipient.or_else(|| match self.recipients.as_slice() {
            [only] => Some(*only),
            _ => None,
        })
    }

    pub const fn sender(&self) -> Result<UserId, ApiError> {
        match self.sender {
            Some(sender) => Ok(sender),
            None => Err(ApiError::MissingSender),
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        self.sender()?;
        self.content.validate()?;

        if self.needs_fanout() || self.single_recipient().is_some() {
            Ok(())
        } else {
            Err(ApiError::MissingRecipient)
        }
    }

    /// Child addressed to `recipient`, inheriting everything needed to render it.
    ///
    /// Muted recipients start out `sent`, so they count towards the parent's
    /// totals without ever being delivered.
    pub fn child_for(&self, recipient: UserId, muted: bool) -> Self {
        Self {
            id: YoId::generate(),
            sender: self.sender,
            recipient: Some(recipient),
            recipients: Vec::new(),
            group: self.group,
            is_broadcast: false,
            parent: Some(self.id),
            reply_to: self.reply_to,
            origin_yo: self.origin_yo,
            content: self.content.clone(),
            header: self.header,
            response_pair: self.response_pair.clone(),
            left_link: self.left_link.clone(),
            right_link: self.right_link.clone(),
            is_poll: self.is_poll,
            is_push_only: self.is_push_only,
            app_id: self.app_id.clone(),
            status: if muted {
                YoStatus::Sent
            } else {
                YoStatus::Pending
            },
            recipient_count: 1,
            sent_count: 0,
            scheduled_for: None,
            schedule_name: None,
            created_at: Utc::now(),
            user_ip: self.user_ip.clone(),
        }
    }
}
