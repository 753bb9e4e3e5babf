use core::fmt::{self, Display, Formatter};
use std::{cmp::Ordering, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    capability::CapabilityProfile,
    ids::{EndpointId, UserId},
};

/// Client platform an endpoint was registered from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Ios,
    IosDevelopment,
    Android,
    Windows,
    WindowsPhone,
    Other,
}

impl Platform {
    /// Key of the push envelope entry this platform reads
    pub const fn protocol(self) -> &'static str {
        match self {
            Self::Ios => "apns",
            Self::IosDevelopment => "apns_sandbox",
            Self::Android => "gcm",
            Self::Windows => "wns",
            Self::WindowsPhone => "mpns",
            Self::Other => "default",
        }
    }

    pub const fn is_ios(self) -> bool {
        matches!(self, Self::Ios | Self::IosDevelopment)
    }

    pub const fn is_windows(self) -> bool {
        matches!(self, Self::Windows | Self::WindowsPhone)
    }
}

impl FromStr for Platform {
    type Err = std::convert::Infallible;

    /// Unrecognised platform strings map to [`Platform::Other`]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "ios" | "iphone" | "ipad" => Self::Ios,
            "ios-development" | "ios_development" | "ios-dev" => Self::IosDevelopment,
            "android" => Self::Android,
            "win8" | "windows" => Self::Windows,
            "winphone" | "windows_phone" | "wp" => Self::WindowsPhone,
            _ => Self::Other,
        })
    }
}

/// Lenient `major.minor.patch` client version.
///
/// Missing components count as zero and anything after the numeric prefix of
/// a component (`"2.1-beta"`) is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AppVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl AppVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        fn component(part: Option<&str>) -> Option<u32> {
            let Some(part) = part else { return Some(0) };
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            if digits.is_empty() {
                None
            } else {
                digits.parse().ok()
            }
        }

        let value = value.trim();
        if value.is_empty() {
            return None;
        }

        let mut parts = value.split('.');
        Some(Self {
            major: component(parts.next())?,
            minor: component(parts.next()).unwrap_or(0),
            patch: component(parts.next()).unwrap_or(0),
        })
    }

    pub fn at_least(self, major: u32, minor: u32, patch: u32) -> bool {
        self.cmp(&Self::new(major, minor, patch)) != Ordering::Less
    }
}

impl Display for AppVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A registered device or address that can receive a push
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: EndpointId,
    pub owner: UserId,
    pub platform: Platform,
    /// Push token or broker address
    pub token: String,
    pub app_id: Option<String>,
    pub app_version: Option<String>,
    pub os_version: Option<String>,
    #[serde(default)]
    pub is_disabled: bool,
}

impl Endpoint {
    pub fn new(owner: UserId, platform: Platform, token: impl Into<String>) -> Self {
        Self {
            id: EndpointId::generate(),
            owner,
            platform,
            token: token.into(),
            app_id: None,
            app_version: None,
            os_version: None,
            is_disabled: false,
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = Some(version.into());
        self
    }

    #[must_use]
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    pub fn version(&self) -> Option<AppVersion> {
        self.app_version.as_deref().and_then(AppVersion::parse)
    }

    /// Clients that predate free text, or never reported a version
    pub fn is_legacy(&self) -> bool {
        self.version()
            .is_none_or(|version| !version.at_least(1, 5, 0))
    }

    pub fn capabilities(&self) -> CapabilityProfile {
        CapabilityProfile::derive(self.platform, self.version(), self.is_legacy())
    }

    /// Whether this endpoint belongs to `app_id`. Endpoints without an app id
    /// predate multi-app support and match everything.
    pub fn serves(&self, app_id: Option<&str>) -> bool {
        match (app_id, self.app_id.as_deref()) {
            (Some(wanted), Some(own)) => wanted == own,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parsing() {
        assert_eq!(AppVersion::parse("2.5.1"), Some(AppVersion::new(2, 5, 1)));
        assert_eq!(AppVersion::parse("2.1"), Some(AppVersion::new(2, 1, 0)));
        assert_eq!(AppVersion::parse("3"), Some(AppVersion::new(3, 0, 0)));
        assert_eq!(AppVersion::parse("2.1-beta.4"), Some(AppVersion::new(2, 1, 4)));
        assert_eq!(AppVersion::parse(""), None);
        assert_eq!(AppVersion::parse("beta"), None);
        assert!(AppVersion::new(2, 0, 0).at_least(1, 9, 9));
        assert!(!AppVersion::new(1, 5, 9).at_least(1, 6, 0));
    }

    #[test]
    fn test_platform_from_str() {
        assert_eq!("iOS".parse(), Ok(Platform::Ios));
        assert_eq!("ios-development".parse(), Ok(Platform::IosDevelopment));
        assert_eq!("android".parse(), Ok(Platform::Android));
        assert_eq!("winphone".parse(), Ok(Platform::WindowsPhone));
        assert_eq!("blackberry".parse(), Ok(Platform::Other));
        assert_eq!(Platform::Android.protocol(), "gcm");
    }

    #[test]
    fn test_legacy_and_app_filter() {
        let owner = UserId::generate();
        let endpoint = Endpoint::new(owner, Platform::Ios, "token");
        assert!(endpoint.is_legacy());
        assert!(!endpoint.clone().with_version("2.0.0").is_legacy());

        let scoped = endpoint.with_app_id("co.justyo.yoapp");
        assert!(scoped.serves(Some("co.justyo.yoapp")));
        assert!(!scoped.serves(Some("co.justyo.noapp")));
        assert!(scoped.serves(None));
    }
}
