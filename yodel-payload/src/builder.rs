use std::sync::Arc;

use yodel_common::{
    ApiError, CapabilityProfile, Header, PayloadType, User, UserId, Yo,
    traits::{Directory, Shortener},
};
use yodel_tracing::traced;

use crate::{
    category::category,
    classify::classify,
    config::PayloadConfig,
    context::{FormatContext, references_social},
    copy::{CopyResolver, legacy_text},
    envelope::{PushEnvelope, PushMessage},
    sms,
    social::social_text,
    webhook::WebhookParams,
};

/// Whether a Yo is rendered as part of a group conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupVariant {
    #[default]
    None,
    /// Sent to a real group
    Group,
    /// Sent to a recipient list with no group behind it
    Legacy,
}

impl GroupVariant {
    /// Variant of `yo`, looking at the fan-out parent for children
    pub fn of(yo: &Yo, parent: Option<&Yo>) -> Self {
        if yo.group.is_some() {
            Self::Group
        } else if yo.is_legacy_group() || parent.is_some_and(Yo::is_legacy_group) {
            Self::Legacy
        } else {
            Self::None
        }
    }

    pub const fn is_group(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// What to render, plus the bits of context only the caller can know
#[derive(Debug, Clone)]
pub struct RenderRequest<'a> {
    pub yo: &'a Yo,
    pub variant: GroupVariant,
    /// Part of a broadcast, either the parent or one of its children
    pub broadcast: bool,
    /// Everyone else a recipient-list Yo went to
    pub co_recipients: Vec<UserId>,
    /// Sender of the Yo being forwarded
    pub origin_sender: Option<UserId>,
}

impl<'a> RenderRequest<'a> {
    pub fn new(yo: &'a Yo, parent: Option<&Yo>) -> Self {
        let variant = GroupVariant::of(yo, parent);

        let co_recipients = if variant == GroupVariant::Legacy {
            parent.map_or_else(|| yo.recipients.clone(), |parent| parent.recipients.clone())
        } else {
            Vec::new()
        };

        Self {
            yo,
            variant,
            broadcast: yo.is_broadcast || parent.is_some_and(|parent| parent.is_broadcast),
            co_recipients,
            origin_sender: None,
        }
    }

    #[must_use]
    pub fn with_origin_sender(mut self, sender: Option<UserId>) -> Self {
        self.origin_sender = sender;
        self
    }
}

/// Everything looked up from collaborators for one Yo, ready to be rendered
/// for any number of capability profiles.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub yo: Yo,
    pub sender: User,
    pub variant: GroupVariant,
    pub broadcast: bool,
    /// The recipient's own name for the sender
    pub contact_name: Option<String>,
    pub origin: Option<User>,
    pub group_name: String,
    pub social: String,
    pub explicit_header: Option<Header>,
    pub short_link: String,
}

impl Prepared {
    fn sender_name(&self, profile: &CapabilityProfile) -> String {
        if profile.handles_display_names {
            self.contact_name
                .clone()
                .unwrap_or_else(|| self.sender.name().to_string())
        } else {
            self.sender.username.clone()
        }
    }

    fn context(&self, profile: &CapabilityProfile) -> FormatContext {
        let content = &self.yo.content;

        FormatContext {
            sender: self.sender_name(profile),
            text: if profile.allows_free_text() {
                content.text.clone().unwrap_or_default()
            } else {
                String::new()
            },
            city: content.city.clone().unwrap_or_default(),
            group: self.group_name.clone(),
            social: self.social.clone(),
            origin: self
                .origin
                .as_ref()
                .map(|origin| {
                    if profile.handles_display_names {
                        origin.name().to_string()
                    } else {
                        origin.username.clone()
                    }
                })
                .unwrap_or_default(),
        }
    }

    /// Group text that doesn't place `{social}` itself gets it appended
    fn social_suffix(&self, template: &str) -> &str {
        if self.variant.is_group() && !references_social(template) {
            &self.social
        } else {
            ""
        }
    }
}

/// Rendered bodies for one capability profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelBodies {
    pub payload_type: PayloadType,
    pub category: Option<String>,
    pub push_text: String,
    pub push: PushEnvelope,
    pub sms: String,
    pub webhook: WebhookParams,
}

pub struct PayloadBuilder {
    copy: CopyResolver,
    directory: Arc<dyn Directory>,
    shortener: Arc<dyn Shortener>,
    config: PayloadConfig,
}

impl PayloadBuilder {
    pub fn new(
        copy: CopyResolver,
        directory: Arc<dyn Directory>,
        shortener: Arc<dyn Shortener>,
        config: PayloadConfig,
    ) -> Self {
        Self {
            copy,
            directory,
            shortener,
            config,
        }
    }

    pub const fn config(&self) -> &PayloadConfig {
        &self.config
    }

    /// Resolves names, headers and links for `request`.
    ///
    /// Only a missing or unknown sender is an error; every other lookup
    /// degrades to an empty value.
    #[traced(instrument(level = tracing::Level::DEBUG, skip_all, fields(yo_id = %request.yo.id)), timing(precision = "us"))]
    pub async fn prepare(&self, request: RenderRequest<'_>) -> Result<Prepared, ApiError> {
        let yo = request.yo;
        let sender = self.directory.user(yo.sender()?).await?;

        let contact_name = match yo.recipient {
            Some(recipient) => self.contact_name(recipient, sender.id).await,
            None => None,
        };

        let origin = match request.origin_sender {
            Some(origin) => self.directory.user(origin).await.ok(),
            None => None,
        };

        let group_name = match yo.group {
            Some(group) => self
                .directory
                .user(group)
                .await
                .map(|group| group.name().to_string())
                .unwrap_or_default(),
            None => String::new(),
        };

        let social = if request.variant.is_group() {
            let members = match (request.variant, yo.group) {
                (GroupVariant::Group, Some(group)) => {
                    self.directory.group_members(group).await.unwrap_or_default()
                }
                _ => request.co_recipients.clone(),
            };
            self.social(yo.recipient, sender.id, &members).await
        } else {
            String::new()
        };

        let explicit_header = match yo.header {
            Some(id) => self.copy.explicit(id).await,
            None => None,
        };

        let short_link = match yo.content.link.as_deref().filter(|link| !link.is_empty()) {
            Some(link) => self.shortener.shorten(link).await,
            None => self.config.app_link.clone(),
        };

        Ok(Prepared {
            yo: yo.clone(),
            sender,
            variant: request.variant,
            broadcast: request.broadcast,
            contact_name,
            origin,
            group_name,
            social,
            explicit_header,
            short_link,
        })
    }

    async fn contact_name(&self, owner: UserId, target: UserId) -> Option<String> {
        self.directory
            .contact_pair(owner, target)
            .await
            .ok()
            .flatten()
            .and_then(|pair| pair.contact_name)
            .filter(|name| !name.trim().is_empty())
    }

    /// Social text as seen by `recipient`: people they saved a name for are
    /// spelled out, everyone else is counted.
    async fn social(&self, recipient: Option<UserId>, sender: UserId, members: &[UserId]) -> String {
        let others = members
            .iter()
            .copied()
            .filter(|member| *member != sender && Some(*member) != recipient);

        let mut named = Vec::with_capacity(2);
        let mut unnamed = 0;

        for member in others {
            let name = match recipient {
                Some(recipient) if named.len() < 2 => self.contact_name(recipient, member).await,
                _ => None,
            };

            match name {
                Some(name) => named.push(name),
                None => unnamed += 1,
            }
        }

        social_text(&named, unnamed)
    }

    /// Renders `prepared` for a client with `profile`
    pub async fn render(&self, prepared: &Prepared, profile: &CapabilityProfile) -> ChannelBodies {
        let yo = &prepared.yo;
        let payload_type = classify(
            yo,
            profile,
            prepared.explicit_header.as_ref(),
            prepared.variant,
        );

        let header = match (&prepared.explicit_header, payload_type) {
            (Some(explicit), PayloadType::Custom) => explicit.clone(),
            _ => {
                self.copy
                    .resolve(payload_type, prepared.variant.is_group(), yo.recipient)
                    .await
            }
        };

        let category = category(
            yo,
            payload_type,
            profile,
            prepared.sender.is_service && prepared.broadcast,
        );

        let push_text = self.push_text(prepared, profile, payload_type, &header);
        let push = PushEnvelope::render(
            &PushMessage {
                yo_id: yo.id.to_string(),
                text: push_text.clone(),
                sender: prepared.sender.username.clone(),
                payload_type: payload_type.to_string(),
                category: category.clone(),
                sound: self.config.sound.clone(),
                link: yo.content.link.clone(),
                location: yo.content.location.map(|location| location.to_string()),
                legacy: profile.is_legacy,
            },
            self.config.apns_max_bytes,
        );

        let sms_context = prepared.context(&CapabilityProfile::sms());
        let sms = sms::assemble(
            &sms_context.render(&header.sms),
            prepared.social_suffix(&header.sms),
            &header.ending,
            &prepared.short_link,
            self.config.sms_max_length,
        );

        ChannelBodies {
            payload_type,
            category,
            push_text,
            push,
            sms,
            webhook: WebhookParams::build(yo, &prepared.sender),
        }
    }

    fn push_text(
        &self,
        prepared: &Prepared,
        profile: &CapabilityProfile,
        payload_type: PayloadType,
        header: &Header,
    ) -> String {
        if profile.is_legacy {
            return legacy_text(payload_type, &prepared.sender.username);
        }

        let rendered = prepared.context(profile).render(&header.push);
        let social = prepared.social_suffix(&header.push);
        let mut text = sms::cleanup(&format!("{rendered} {social}"));

        if !profile.handles_long_text {
            text = sms::truncate(&text, "", self.config.short_push_max_length);
        }

        if !profile.handles_unicode {
            text = sms::cleanup(&text.chars().filter(char::is_ascii).collect::<String>());
        }

        text
    }

    /// Convenience for a single render
    pub async fn render_for(
        &self,
        request: RenderRequest<'_>,
        profile: &CapabilityProfile,
    ) -> Result<ChannelBodies, ApiError> {
        let prepared = self.prepare(request).await?;
        Ok(self.render(&prepared, profile).await)
    }

    /// One-time SMS introducing Yo to a first-time SMS recipient
    pub fn welcome_sms(&self, prepared: &Prepared) -> String {
        let context = prepared.context(&CapabilityProfile::sms());
        sms::cleanup(&context.render(&self.config.welcome_sms))
    }
}
