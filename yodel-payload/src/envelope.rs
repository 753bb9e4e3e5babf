//! Multi-protocol push envelope.
//!
//! The broker receives one JSON object with a string per protocol and picks
//! the entry matching each target's platform. Every entry is serialised on its
//! own so a bad one never takes the others down with it.

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::error::RenderError;

/// Everything the envelope renderers need to know about one notification
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PushMessage {
    pub yo_id: String,
    pub text: String,
    pub sender: String,
    pub payload_type: String,
    pub category: Option<String>,
    pub sound: String,
    pub link: Option<String>,
    pub location: Option<String>,
    /// Legacy clients get the bare alert and nothing else
    pub legacy: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushEnvelope {
    pub default: String,
    pub gcm: String,
    pub apns: String,
    pub apns_sandbox: String,
    pub wns: String,
    pub mpns: String,
}

impl PushEnvelope {
    pub fn render(message: &PushMessage, apns_max_bytes: usize) -> Self {
        let apns = settle("apns", apns(message));
        if apns.len() > apns_max_bytes {
            tracing::warn!(
                yo_id = %message.yo_id,
                size = apns.len(),
                limit = apns_max_bytes,
                "APNs payload is over the size limit"
            );
        }

        Self {
            default: message.text.clone(),
            gcm: settle("gcm", gcm(message)),
            apns_sandbox: apns.clone(),
            apns,
            wns: settle("wns", wns(message)),
            mpns: settle("mpns", mpns(message)),
        }
    }

    /// Entry read by clients on `protocol`
    pub fn get(&self, protocol: &str) -> &str {
        match protocol {
            "gcm" => &self.gcm,
            "apns" => &self.apns,
            "apns_sandbox" => &self.apns_sandbox,
            "wns" => &self.wns,
            "mpns" => &self.mpns,
            _ => &self.default,
        }
    }

    /// The JSON object handed to the broker
    pub fn to_json(&self) -> Result<String, RenderError> {
        Ok(serde_json::to_string(self)?)
    }
}

fn settle(protocol: &str, rendered: Result<String, RenderError>) -> String {
    rendered.unwrap_or_else(|err| {
        tracing::warn!(protocol, %err, "Failed to render push payload");
        String::new()
    })
}

fn extras(message: &PushMessage, into: &mut Map<String, Value>) {
    into.insert("yo_id".into(), json!(message.yo_id));
    into.insert("sender".into(), json!(message.sender));

    if message.legacy {
        return;
    }

    into.insert("type".into(), json!(message.payload_type));
    if let Some(link) = &message.link {
        into.insert("link".into(), json!(link));
    }
    if let Some(location) = &message.location {
        into.insert("location".into(), json!(location));
    }
}

fn apns(message: &PushMessage) -> Result<String, RenderError> {
    let mut aps = Map::new();
    aps.insert("alert".into(), json!(message.text));
    aps.insert("sound".into(), json!(message.sound));
    if let Some(category) = &message.category {
        aps.insert("category".into(), json!(category));
    }

    let mut body = Map::new();
    body.insert("aps".into(), Value::Object(aps));
    extras(message, &mut body);

    Ok(serde_json::to_string(&body)?)
}

fn gcm(message: &PushMessage) -> Result<String, RenderError> {
    let mut data = Map::new();
    data.insert("message".into(), json!(message.text));
    if let Some(category) = &message.category {
        data.insert("category".into(), json!(category));
    }
    extras(message, &mut data);

    Ok(serde_json::to_string(&json!({ "data": data }))?)
}

fn escape_xml(text: &str) -> Result<String, RenderError> {
    let mut escaped = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\t' | '\n' | '\r' => escaped.push(c),
            c if c.is_control() && u32::from(c) < 0x20 => return Err(RenderError::InvalidXml(c)),
            c => escaped.push(c),
        }
    }

    Ok(escaped)
}

fn wns(message: &PushMessage) -> Result<String, RenderError> {
    Ok(format!(
        "<toast launch=\"yo_id={}\"><visual><binding template=\"ToastText01\"><text id=\"1\">{}</text></binding></visual></toast>",
        escape_xml(&message.yo_id)?,
        escape_xml(&message.text)?,
    ))
}

fn mpns(message: &PushMessage) -> Result<String, RenderError> {
    Ok(format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?><wp:Notification xmlns:wp=\"WPNotification\"><wp:Toast><wp:Text1>Yo</wp:Text1><wp:Text2>{}</wp:Text2><wp:Param>/Yo.xaml?yo_id={}</wp:Param></wp:Toast></wp:Notification>",
        escape_xml(&message.text)?,
        escape_xml(&message.yo_id)?,
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn message() -> PushMessage {
        PushMessage {
            yo_id: "01J0000000000000000000000".into(),
            text: "Yo Link from ALICE".into(),
            sender: "ALICE".into(),
            payload_type: "link".into(),
            category: Some("link".into()),
            sound: "yo.mp3".into(),
            link: Some("https://a.b".into()),
            location: None,
            legacy: false,
        }
    }

    #[test]
    fn test_apns_shape() {
        let envelope = PushEnvelope::render(&message(), 2048);
        let apns: Value = serde_json::from_str(&envelope.apns).unwrap();

        assert_eq!(apns["aps"]["alert"], "Yo Link from ALICE");
        assert_eq!(apns["aps"]["category"], "link");
        assert_eq!(apns["link"], "https://a.b");
        assert_eq!(envelope.apns, envelope.apns_sandbox);
        assert_eq!(envelope.default, "Yo Link from ALICE");
    }

    #[test]
    fn test_legacy_apns_is_bare() {
        let mut legacy = message();
        legacy.legacy = true;
        legacy.category = None;

        let apns: Value =
            serde_json::from_str(&PushEnvelope::render(&legacy, 2048).apns).unwrap();
        assert!(apns.get("link").is_none());
        assert!(apns["aps"].get("category").is_none());
    }

    #[test]
    fn test_gcm_shape() {
        let gcm: Value = serde_json::from_str(&PushEnvelope::render(&message(), 2048).gcm).unwrap();
        assert_eq!(gcm["data"]["message"], "Yo Link from ALICE");
        assert_eq!(gcm["data"]["type"], "link");
    }

    #[test]
    fn test_xml_escaping() {
        let mut spicy = message();
        spicy.text = "Tom & <Jerry>".into();

        let envelope = PushEnvelope::render(&spicy, 2048);
        assert!(envelope.wns.contains("Tom &amp; &lt;Jerry&gt;"));
        assert!(envelope.mpns.contains("<wp:Text2>Tom &amp; &lt;Jerry&gt;</wp:Text2>"));
    }

    #[test]
    fn test_bad_xml_only_blanks_windows_entries() {
        let mut broken = message();
        broken.text = "bell\u{7}".into();

        let envelope = PushEnvelope::render(&broken, 2048);
        assert_eq!(envelope.wns, "");
        assert_eq!(envelope.mpns, "");
        assert!(!envelope.apns.is_empty());
        assert!(!envelope.gcm.is_empty());
    }

    #[test]
    fn test_oversized_apns_is_still_rendered() {
        let mut long = message();
        long.text = "A".repeat(4000);

        let envelope = PushEnvelope::render(&long, 2048);
        assert!(envelope.apns.len() > 2048);
    }

    #[test]
    fn test_envelope_keys() {
        let json: Value =
            serde_json::from_str(&PushEnvelope::render(&message(), 2048).to_json().unwrap())
                .unwrap();
        for key in ["default", "gcm", "apns", "apns_sandbox", "wns", "mpns"] {
            assert!(json[key].is_string(), "missing {key}");
        }
    }
}
