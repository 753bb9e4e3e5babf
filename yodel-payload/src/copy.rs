//! Resolves which header words a Yo's push and SMS text.

use std::sync::Arc;

use yodel_common::{
    Header, HeaderId, PayloadType, UserId,
    traits::{AbTesting, HeaderSource},
};

/// Built-in template for single-recipient Yos
const fn builtin_template(payload_type: PayloadType) -> &'static str {
    match payload_type {
        PayloadType::Default | PayloadType::Custom => "Yo from {sender}",
        PayloadType::Link => "Yo Link from {sender}",
        PayloadType::Location => "@ Yo Location from {sender}",
        PayloadType::LocationCity => "@ Yo from {sender} in {city}",
        PayloadType::Photo => "Yo Photo from {sender}",
        PayloadType::Gif => "Yo GIF from {sender}",
        PayloadType::Audio => "Yo Audio from {sender}",
        PayloadType::Video => "Yo Video from {sender}",
        PayloadType::Context => "{sender}: {text}",
        PayloadType::Forwarded => "{sender} forwarded a Yo from {origin}",
        PayloadType::ForwardedPhoto => "{sender} forwarded a photo from {origin}",
        PayloadType::LegacyGroup => "Yo from {sender} {social}",
    }
}

const BUILTIN_ENDING: &str = "Tap to Yo back:";

/// The header used when nothing is configured for `(payload_type, is_group)`
pub fn builtin(payload_type: PayloadType, is_group: bool) -> Header {
    let single = builtin_template(payload_type);

    let template = if is_group && payload_type != PayloadType::LegacyGroup {
        format!("{single} to {{group}} {{social}}")
    } else {
        single.to_string()
    };

    Header {
        id: HeaderId::new(ulid::Ulid::nil()),
        payload_type,
        is_group,
        is_default: true,
        sms: template.clone(),
        push: template,
        ending: BUILTIN_ENDING.to_string(),
    }
}

/// Fixed text for clients that can't render arbitrary push text
pub fn legacy_text(payload_type: PayloadType, username: &str) -> String {
    let marker = match payload_type {
        PayloadType::Link
        | PayloadType::Photo
        | PayloadType::Gif
        | PayloadType::Audio
        | PayloadType::Video
        | PayloadType::ForwardedPhoto => "*",
        PayloadType::Location | PayloadType::LocationCity => "@",
        PayloadType::Default
        | PayloadType::Context
        | PayloadType::Custom
        | PayloadType::Forwarded
        | PayloadType::LegacyGroup => "Yo",
    };

    format!("{marker} From {username}")
}

pub struct CopyResolver {
    headers: Arc<dyn HeaderSource>,
    ab_testing: Arc<dyn AbTesting>,
    dimension: String,
}

impl CopyResolver {
    pub fn new(
        headers: Arc<dyn HeaderSource>,
        ab_testing: Arc<dyn AbTesting>,
        dimension: impl Into<String>,
    ) -> Self {
        Self {
            headers,
            ab_testing,
            dimension: dimension.into(),
        }
    }

    /// Header for `(payload_type, is_group)`.
    ///
    /// `enrolled` is the user whose A/B enrollment is consulted. An enrolled
    /// header only applies when it was written for the same key.
    pub async fn resolve(
        &self,
        payload_type: PayloadType,
        is_group: bool,
        enrolled: Option<UserId>,
    ) -> Header {
        if let Some(user) = enrolled
            && let Some(header) = self.ab_testing.enrolled_header(user, &self.dimension).await
            && header.matches(payload_type, is_group)
        {
            return header;
        }

        if let Some(header) = self.headers.default_header(payload_type, is_group).await {
            return header;
        }

        builtin(payload_type, is_group)
    }

    /// Header explicitly chosen by a sender
    pub async fn explicit(&self, id: HeaderId) -> Option<Header> {
        self.headers.header(id).await
    }
}
