//! Interactive notification categories.

use yodel_common::{CapabilityProfile, PayloadType, Yo};

/// Categories picked by what a Yo says rather than what it is. The last
/// column marks emoji categories, which never take the service suffix.
const CONTENT_CATEGORIES: &[(PayloadType, &str, &str, bool)] = &[
    (PayloadType::Context, "👍", "👍.👎", true),
    (PayloadType::Context, "😂", "😂.😍", true),
    (PayloadType::Context, "?", "yes.no", false),
    (PayloadType::Custom, "👍", "👍.👎", true),
];

const SERVICE_SUFFIX: &str = "_service";

fn by_type(payload_type: PayloadType) -> &'static str {
    match payload_type {
        PayloadType::Default
        | PayloadType::Context
        | PayloadType::Custom
        | PayloadType::Forwarded => "yo",
        PayloadType::Link | PayloadType::Audio | PayloadType::Video => "link",
        PayloadType::Location | PayloadType::LocationCity => "location",
        PayloadType::Photo | PayloadType::Gif | PayloadType::ForwardedPhoto => "photo",
        PayloadType::LegacyGroup => "group",
    }
}

fn by_content(yo: &Yo, payload_type: PayloadType) -> Option<(&'static str, bool)> {
    let text = yo.content.text.as_deref()?.trim();

    CONTENT_CATEGORIES
        .iter()
        .find(|(ty, content, _, _)| *ty == payload_type && *content == text)
        .map(|(_, _, category, emoji)| (*category, *emoji))
}

/// Category for `yo` once classified as `payload_type`.
///
/// An explicit response pair wins, then the content table, then the type map.
/// Service accounts broadcasting get `_service` appended unless the category
/// came from an emoji entry of the content table. Clients without category support get `None`.
pub fn category(
    yo: &Yo,
    payload_type: PayloadType,
    profile: &CapabilityProfile,
    service_broadcast: bool,
) -> Option<String> {
    if !profile.handles_categories {
        return None;
    }

    let (mut category, emoji) = if let Some(pair) = &yo.response_pair {
        (pair.category(), false)
    } else if let Some((category, emoji)) = by_content(yo, payload_type) {
        (category.to_string(), emoji)
    } else {
        (by_type(payload_type).to_string(), false)
    };

    if service_broadcast && !emoji {
        category.push_str(SERVICE_SUFFIX);
    }

    Some(category)
}
