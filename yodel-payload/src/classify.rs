use yodel_common::{CapabilityProfile, Header, PayloadType, Yo};

use crate::builder::GroupVariant;

/// Type implied by the MIME type of a Yo's link target
fn from_content_type(mime: &str) -> Option<PayloadType> {
    let mime = mime.trim().to_ascii_lowercase();

    if mime.starts_with("audio/") {
        Some(PayloadType::Audio)
    } else if mime.starts_with("video/") {
        Some(PayloadType::Video)
    } else if mime == "image/gif" {
        Some(PayloadType::Gif)
    } else if mime.starts_with("image/") {
        Some(PayloadType::Photo)
    } else {
        None
    }
}

/// Classifies `yo` for a client with `profile`.
///
/// Rules run in a fixed order and each later rule overrides what came before:
///
/// 1. default
/// 2. a link makes it [`PayloadType::Link`]
/// 3. a location makes it [`PayloadType::Location`]
/// 4. the link's MIME type (audio, video, `image/gif`, other images) or an
///    uploaded photo
/// 5. for clients that take free text: a location with a city, a forward of
///    another Yo, or text with nothing else attached
/// 6. an explicit header of a different type makes it [`PayloadType::Custom`]
/// 7. a recipient list without a real group is [`PayloadType::LegacyGroup`]
pub fn classify(
    yo: &Yo,
    profile: &CapabilityProfile,
    explicit_header: Option<&Header>,
    variant: GroupVariant,
) -> PayloadType {
    let content = &yo.content;
    let mut payload_type = PayloadType::Default;

    if content.has_link() {
        payload_type = PayloadType::Link;
    }

    if content.has_location() {
        payload_type = PayloadType::Location;
    }

    if let Some(overridden) = content
        .link_content_type
        .as_deref()
        .and_then(from_content_type)
    {
        payload_type = overridden;
    }

    if content.photo.is_some() && !payload_type.is_photo() {
        payload_type = PayloadType::Photo;
    }

    if profile.allows_free_text() {
        if content.has_location() && content.city.as_deref().is_some_and(|c| !c.is_empty()) {
            payload_type = PayloadType::LocationCity;
        }

        if yo.origin_yo.is_some() {
            payload_type = if payload_type.is_photo() {
                PayloadType::ForwardedPhoto
            } else {
                PayloadType::Forwarded
            };
        }

        if content.has_text()
            && !content.has_link()
            && !content.has_location()
            && content.photo.is_none()
        {
            payload_type = PayloadType::Context;
        }
    }

    if explicit_header.is_some_and(|header| header.payload_type != payload_type) {
        payload_type = PayloadType::Custom;
    }

    if variant == GroupVariant::Legacy {
        payload_type = PayloadType::LegacyGroup;
    }

    payload_type
}

#[cfg(test)]
mod tests {
    use yodel_common::{AppVersion, Platform, UserId, YoId};

    use super::*;

    fn modern() -> CapabilityProfile {
        CapabilityProfile::derive(Platform::Ios, AppVersion::parse("2.5.0"), false)
    }

    fn legacy() -> CapabilityProfile {
        CapabilityProfile::derive(Platform::Ios, None, true)
    }

    fn yo() -> Yo {
        Yo::to(UserId::generate(), UserId::generate())
    }

    fn single(yo: &Yo, profile: &CapabilityProfile) -> PayloadType {
        classify(yo, profile, None, GroupVariant::None)
    }

    #[test]
    fn test_plain_link_location() {
        assert_eq!(single(&yo(), &modern()), PayloadType::Default);
        assert_eq!(single(&yo().with_link("https://a.b"), &modern()), PayloadType::Link);
        assert_eq!(single(&yo().with_location(1.0, 2.0), &modern()), PayloadType::Location);
    }

    #[test]
    fn test_content_type_overrides() {
        let link = |mime: &str| yo().with_link("https://a.b/x").with_link_content_type(mime);

        assert_eq!(single(&link("audio/mpeg"), &modern()), PayloadType::Audio);
        assert_eq!(single(&link("video/mp4"), &modern()), PayloadType::Video);
        assert_eq!(single(&link("image/gif"), &modern()), PayloadType::Gif);
        assert_eq!(single(&link("image/png"), &modern()), PayloadType::Photo);
        assert_eq!(single(&link("text/html"), &modern()), PayloadType::Link);
        assert_eq!(single(&yo().with_photo("https://img"), &legacy()), PayloadType::Photo);
    }

    #[test]
    fn test_gif_with_text_stays_gif() {
        let yo = yo()
            .with_link("https://a.b/x.gif")
            .with_link_content_type("image/gif")
            .with_text("look at this");
        assert_eq!(single(&yo, &modern()), PayloadType::Gif);
    }

    #[test]
    fn test_free_text_rules_need_capable_client() {
        let city = yo().with_location(1.0, 2.0).with_city("Tel Aviv");
        assert_eq!(single(&city, &modern()), PayloadType::LocationCity);
        assert_eq!(single(&city, &legacy()), PayloadType::Location);

        let context = yo().with_text("lunch?");
        assert_eq!(single(&context, &modern()), PayloadType::Context);
        assert_eq!(single(&context, &legacy()), PayloadType::Default);

        let older = CapabilityProfile::derive(Platform::Ios, AppVersion::parse("1.9.0"), false);
        assert_eq!(single(&context, &older), PayloadType::Default);
    }

    #[test]
    fn test_forwards() {
        let mut forward = yo().with_link("https://a.b");
        forward.origin_yo = Some(YoId::generate());
        assert_eq!(single(&forward, &modern()), PayloadType::Forwarded);

        let mut photo = yo().with_link("https://a.b/p.png").with_link_content_type("image/png");
        photo.origin_yo = Some(YoId::generate());
        assert_eq!(single(&photo, &modern()), PayloadType::ForwardedPhoto);
        assert_eq!(single(&photo, &legacy()), PayloadType::Photo);
    }

    #[test]
    fn test_later_free_text_rules_win() {
        let mut city = yo().with_location(1.0, 2.0).with_city("Paris");
        city.origin_yo = Some(YoId::generate());
        assert_eq!(single(&city, &modern()), PayloadType::Forwarded);

        let mut text = yo().with_text("seen this?");
        text.origin_yo = Some(YoId::generate());
        assert_eq!(single(&text, &modern()), PayloadType::Context);
        assert_eq!(single(&text, &legacy()), PayloadType::Default);
    }

    #[test]
    fn test_header_and_legacy_group() {
        let header = Header::new(PayloadType::Link, false, "", "", "");
        let linked = yo().with_link("https://a.b");
        assert_eq!(
            classify(&linked, &modern(), Some(&header), GroupVariant::None),
            PayloadType::Link
        );

        let location = yo().with_location(1.0, 2.0);
        assert_eq!(
            classify(&location, &modern(), Some(&header), GroupVariant::None),
            PayloadType::Custom
        );

        assert_eq!(
            classify(&linked, &modern(), Some(&header), GroupVariant::Legacy),
            PayloadType::LegacyGroup
        );
        assert_eq!(
            classify(&linked, &modern(), None, GroupVariant::Group),
            PayloadType::Link
        );
    }
}
