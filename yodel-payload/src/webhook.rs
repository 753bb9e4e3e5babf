use serde::Serialize;
use yodel_common::{User, Yo};

/// Query parameters sent to an integration's callback URL.
///
/// Empty values are left out entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WebhookParams(Vec<(String, String)>);

impl WebhookParams {
    pub fn build(yo: &Yo, sender: &User) -> Self {
        let mut params = Self::default();

        params.push("username", Some(sender.username.as_str()));
        params.push("display_name", sender.display_name.as_deref());
        params.push("yo_id", Some(yo.id.to_string().as_str()));
        params.push("link", yo.content.link.as_deref());
        params.push(
            "location",
            yo.content.location.map(|location| location.to_string()).as_deref(),
        );
        params.push("text", yo.content.text.as_deref());
        params.push(
            "reply_to",
            yo.reply_to.map(|id| id.to_string()).as_deref(),
        );
        params.push("user_ip", yo.user_ip.as_deref());

        params
    }

    fn push(&mut self, key: &str, value: Option<&str>) {
        if let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) {
            self.0.push((key.to_string(), value.to_string()));
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
