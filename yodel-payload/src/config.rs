use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadConfig {
    #[serde(default = "defaults::sms_max_length")]
    pub sms_max_length: usize,

    /// Push text limit for clients that can't show long text
    #[serde(default = "defaults::short_push_max_length")]
    pub short_push_max_length: usize,

    /// APNs bodies above this are logged (still sent)
    #[serde(default = "defaults::apns_max_bytes")]
    pub apns_max_bytes: usize,

    /// A/B dimension copy headers are enrolled under
    #[serde(default = "defaults::ab_dimension")]
    pub ab_dimension: String,

    #[serde(default = "defaults::sound")]
    pub sound: String,

    /// Linked from SMS bodies for Yos that carry no link of their own
    #[serde(default = "defaults::app_link")]
    pub app_link: String,

    #[serde(default = "defaults::welcome_sms")]
    pub welcome_sms: String,
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            sms_max_length: defaults::sms_max_length(),
            short_push_max_length: defaults::short_push_max_length(),
            apns_max_bytes: defaults::apns_max_bytes(),
            ab_dimension: defaults::ab_dimension(),
            sound: defaults::sound(),
            app_link: defaults::app_link(),
            welcome_sms: defaults::welcome_sms(),
        }
    }
}

mod defaults {
    pub const fn sms_max_length() -> usize {
        160
    }

    pub const fn short_push_max_length() -> usize {
        100
    }

    pub const fn apns_max_bytes() -> usize {
        2048
    }

    pub fn ab_dimension() -> String {
        "notification_copy".to_string()
    }

    pub fn sound() -> String {
        "yo.mp3".to_string()
    }

    pub fn app_link() -> String {
        "https://justyo.co".to_string()
    }

    pub fn welcome_sms() -> String {
        "{sender} sent you a Yo! Reply YO to Yo back, or STOP to opt out.".to_string()
    }
}
