use core::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Classified kind of a Yo's content. The tags are stable and shared with
/// header rows and analytics consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PayloadType {
    #[default]
    Default,
    Link,
    Location,
    LocationCity,
    Photo,
    Gif,
    Audio,
    Video,
    Context,
    Custom,
    Forwarded,
    ForwardedPhoto,
    LegacyGroup,
}

impl PayloadType {
    pub const ALL: [Self; 13] = [
        Self::Default,
        Self::Link,
        Self::Location,
        Self::LocationCity,
        Self::Photo,
        Self::Gif,
        Self::Audio,
        Self::Video,
        Self::Context,
        Self::Custom,
        Self::Forwarded,
        Self::ForwardedPhoto,
        Self::LegacyGroup,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Link => "link",
            Self::Location => "location",
            Self::LocationCity => "location_city",
            Self::Photo => "photo",
            Self::Gif => "gif",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Context => "context",
            Self::Custom => "custom",
            Self::Forwarded => "forwarded",
            Self::ForwardedPhoto => "forwarded_photo",
            Self::LegacyGroup => "legacy_group",
        }
    }

    /// Photo-like types are rendered with an image attachment
    pub const fn is_photo(self) -> bool {
        matches!(self, Self::Photo | Self::Gif | Self::ForwardedPhoto)
    }
}

impl Display for PayloadType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown payload type: {0}")]
pub struct UnknownPayloadType(pub String);

impl FromStr for PayloadType {
    type Err = UnknownPayloadType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| UnknownPayloadType(s.to_string()))
    }
}
