//! Audit trail for Yo lifecycle events
//!
//! Events are emitted as structured `tracing` events with an `event` field so
//! they can be routed to a dedicated sink.
//!
//! ## Audit Events
//!
//! - `YoAccepted`: A Yo was validated, recorded and enqueued
//! - `PushAttempt`: A publish to the push broker for one endpoint or batch
//! - `EndpointDisabled`: The broker rejected an endpoint for good
//! - `YoFailed`: A Yo ended up `failed` after its retry budget ran out
//!
//! ## Redaction
//!
//! Phone numbers and free text can be redacted through [`AuditConfig`].

use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Mask all but the last four digits of phone numbers
    #[serde(default = "default_true")]
    pub redact_phone_numbers: bool,

    /// Replace Yo text with its length
    #[serde(default = "default_true")]
    pub redact_text: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            redact_phone_numbers: true,
            redact_text: true,
        }
    }
}

const fn default_true() -> bool {
    true
}

static AUDIT_CONFIG: OnceLock<Arc<AuditConfig>> = OnceLock::new();

/// Initialise audit logging. Only the first call has any effect.
pub fn init(config: AuditConfig) {
    AUDIT_CONFIG.get_or_init(|| Arc::new(config));
}

#[must_use]
pub fn config() -> Arc<AuditConfig> {
    AUDIT_CONFIG
        .get()
        .cloned()
        .unwrap_or_else(|| Arc::new(AuditConfig::default()))
}

#[must_use]
pub fn redact_phone(phone: &str, redact: bool) -> String {
    if !redact {
        return phone.to_string();
    }

    let digits = phone.chars().filter(char::is_ascii_digit).count();
    if digits <= 4 {
        return "[REDACTED]".to_string();
    }

    let mut remaining = digits - 4;
    phone
        .chars()
        .map(|c| {
            if c.is_ascii_digit() && remaining > 0 {
                remaining -= 1;
                '*'
            } else {
                c
            }
        })
        .collect()
}

#[must_use]
pub fn redact_text(text: &str, redact: bool) -> String {
    if redact {
        format!("[REDACTED {} chars]", text.chars().count())
    } else {
        text.to_string()
    }
}

/// Logged once a Yo has been recorded and its delivery enqueued
pub fn log_yo_accepted(yo_id: &str, sender: &str, kind: &str, text: Option<&str>) {
    let config = config();
    if !config.enabled {
        return;
    }

    let text = text.map(|text| redact_text(text, config.redact_text));

    tracing::event!(
        tracing::Level::INFO,
        event = "YoAccepted",
        yo_id = %yo_id,
        sender = %sender,
        kind = %kind,
        text = ?text,
        "Audit: Yo accepted"
    );
}

/// Logged for every broker publish
///
/// # Fields
/// - `yo_id`: The Yo (or fan-out parent) being delivered
/// - `target`: Endpoint id, or the partition size for batch publishes
/// - `protocol`: Envelope key the target reads
/// - `attempt`: 1-based attempt number
pub fn log_push_attempt(yo_id: &str, target: &str, protocol: &str, attempt: u32) {
    let config = config();
    if !config.enabled {
        return;
    }

    tracing::event!(
        tracing::Level::INFO,
        event = "PushAttempt",
        yo_id = %yo_id,
        target = %target,
        protocol = %protocol,
        attempt = attempt,
        "Audit: Push attempt"
    );
}

/// Logged when the broker reports an endpoint as permanently unreachable
pub fn log_endpoint_disabled(endpoint_id: &str, owner: &str, code: &str) {
    let config = config();
    if !config.enabled {
        return;
    }

    tracing::event!(
        tracing::Level::WARN,
        event = "EndpointDisabled",
        endpoint_id = %endpoint_id,
        owner = %owner,
        code = %code,
        "Audit: Endpoint disabled"
    );
}

/// Logged when an SMS is handed to the provider
pub fn log_sms_sent(yo_id: &str, phone: &str, welcome: bool) {
    let config = config();
    if !config.enabled {
        return;
    }

    let phone = redact_phone(phone, config.redact_phone_numbers);

    tracing::event!(
        tracing::Level::INFO,
        event = "SmsSent",
        yo_id = %yo_id,
        phone = %phone,
        welcome = welcome,
        "Audit: SMS sent"
    );
}

/// Logged when a Yo is marked `failed`
pub fn log_yo_failed(yo_id: &str, error: &str, attempts: u32) {
    let config = config();
    if !config.enabled {
        return;
    }

    tracing::event!(
        tracing::Level::WARN,
        event = "YoFailed",
        yo_id = %yo_id,
        error = %error,
        attempts = attempts,
        "Audit: Yo failed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_phone() {
        assert_eq!(redact_phone("+1 415 555 0100", true), "+* *** *** 0100");
        assert_eq!(redact_phone("+14155550100", false), "+14155550100");
        assert_eq!(redact_phone("0100", true), "[REDACTED]");
    }

    #[test]
    fn test_redact_text() {
        assert_eq!(redact_text("see you at 5", true), "[REDACTED 12 chars]");
        assert_eq!(redact_text("see you at 5", false), "see you at 5");
    }

    #[test]
    fn test_default_config() {
        let config = AuditConfig::default();
        assert!(config.enabled);
        assert!(config.redact_phone_numbers);
        assert!(config.redact_text);
    }

    #[test]
    fn test_audit_disabled() {
        init(AuditConfig {
            enabled: false,
            redact_phone_numbers: false,
            redact_text: false,
        });

        log_yo_accepted("yo", "ALICE", "link", Some("hello"));
        log_push_attempt("yo", "endpoint", "apns", 1);
        log_endpoint_disabled("endpoint", "ALICE", "InvalidToken");
        log_sms_sent("yo", "+14155550100", true);
        log_yo_failed("yo", "broker unavailable", 5);
    }
}
