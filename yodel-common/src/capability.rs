use serde::Serialize;

use crate::endpoint::{AppVersion, Platform};

/// What a receiving client is able to render.
///
/// Derived from the endpoint every time it's needed and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[allow(
    clippy::struct_excessive_bools,
    reason = "Each flag gates an independent payload field"
)]
pub struct CapabilityProfile {
    pub platform: Platform,
    pub is_legacy: bool,
    /// Arbitrary push text rather than the fixed `"Yo From X"` format
    pub handles_any_text: bool,
    pub handles_long_text: bool,
    pub handles_categories: bool,
    pub handles_display_names: bool,
    pub handles_unicode: bool,
}

impl CapabilityProfile {
    /// Builds the profile for `platform` at `version`.
    ///
    /// Legacy clients get nothing beyond unicode support; an unknown version is
    /// treated as the oldest client of its platform.
    pub fn derive(platform: Platform, version: Option<AppVersion>, legacy: bool) -> Self {
        let at_least = |major, minor, patch| {
            version.is_some_and(|version| version.at_least(major, minor, patch))
        };

        let handles_unicode = !matches!(platform, Platform::WindowsPhone | Platform::Other);

        if legacy {
            return Self {
                platform,
                is_legacy: true,
                handles_any_text: false,
                handles_long_text: false,
                handles_categories: false,
                handles_display_names: false,
                handles_unicode,
            };
        }

        let (handles_any_text, handles_long_text, handles_categories) = match platform {
            Platform::Ios | Platform::IosDevelopment => {
                (at_least(2, 0, 0), at_least(2, 5, 0), at_least(1, 6, 0))
            }
            Platform::Android => (at_least(2, 0, 0), true, at_least(2, 1, 0)),
            Platform::Windows | Platform::WindowsPhone | Platform::Other => (false, false, false),
        };

        Self {
            platform,
            is_legacy: false,
            handles_any_text,
            handles_long_text,
            handles_categories,
            handles_display_names: at_least(1, 8, 0),
            handles_unicode,
        }
    }

    /// Profile of the newest client on `platform`
    pub fn current(platform: Platform) -> Self {
        Self::derive(platform, Some(AppVersion::new(u32::MAX, 0, 0)), false)
    }

    /// Profile used when rendering for SMS, which can carry any text
    pub const fn sms() -> Self {
        Self {
            platform: Platform::Other,
            is_legacy: false,
            handles_any_text: true,
            handles_long_text: true,
            handles_categories: false,
            handles_display_names: true,
            handles_unicode: true,
        }
    }

    /// Whether the classifier may use the free-text payload types
    pub const fn allows_free_text(&self) -> bool {
        self.handles_any_text && !self.is_legacy
    }
}
