//! Connection configuration model.
//!
//! Holds the parsed connection parameters (network credentials, broker
//! address/credentials/topic, transport security flag) behind hard byte
//! ceilings. The original firmware stored these in fixed-size buffers with
//! manual length checks; here the ceilings are enforced once, at
//! construction, by [`BoundedStr`].

use std::fmt;
use thiserror::Error;

use crate::url::BrokerUrl;

/// Usable capacity of the network identifier field (SSID-sized).
pub const NETWORK_ID_MAX: usize = 31;
/// Usable capacity of the network secret field (WPA2 passphrase-sized).
pub const NETWORK_SECRET_MAX: usize = 63;
/// Usable capacity of each broker field (user, pass, host, topic).
pub const BROKER_FIELD_MAX: usize = 47;

/// Returned when a value exceeds a field's byte ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("value is {len} bytes, limit is {max}")]
pub struct FieldTooLong {
    pub len: usize,
    pub max: usize,
}

/// Owned string with a byte-length ceiling enforced at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundedStr<const MAX: usize>(String);

impl<const MAX: usize> BoundedStr<MAX> {
    pub fn new(value: impl Into<String>) -> Result<Self, FieldTooLong> {
        let value = value.into();
        if value.len() > MAX {
            return Err(FieldTooLong {
                len: value.len(),
                max: MAX,
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The ceiling, in bytes.
    pub const fn capacity() -> usize {
        MAX
    }
}

impl<const MAX: usize> fmt::Display for BoundedStr<MAX> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<const MAX: usize> AsRef<str> for BoundedStr<MAX> {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Parsed connection parameters for the link and broker layers.
///
/// Created empty-and-invalid at startup, populated wholesale from the
/// settings store or a reload command, and treated as immutable while a
/// session is in progress. `valid` covers the broker fields only: it is
/// set exactly when [`ConnectionConfig::apply_broker_url`] succeeded, so
/// `valid == true` implies a non-blank host and topic.
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfig {
    pub network_id: BoundedStr<NETWORK_ID_MAX>,
    pub network_secret: BoundedStr<NETWORK_SECRET_MAX>,
    pub broker_user: BoundedStr<BROKER_FIELD_MAX>,
    pub broker_pass: BoundedStr<BROKER_FIELD_MAX>,
    pub broker_host: BoundedStr<BROKER_FIELD_MAX>,
    pub broker_topic: BoundedStr<BROKER_FIELD_MAX>,
    pub use_tls: bool,
    pub valid: bool,
}

impl ConnectionConfig {
    /// Reset every field. Used before a reload so a partial or corrupted
    /// settings store can never leave a stale/fresh mix behind.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Install the broker half of the config from a parsed URL and mark
    /// it valid. All four broker fields are replaced together.
    pub fn apply_broker_url(&mut self, url: BrokerUrl) {
        self.broker_user = url.user;
        self.broker_pass = url.pass;
        self.broker_host = url.host;
        self.broker_topic = url.topic;
        self.use_tls = url.use_tls;
        self.valid = true;
    }
}

/// Configuration loading errors. All recoverable: a failed load leaves the
/// device running with an invalid config and a "check settings" status.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("failed to parse settings TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("setting '{key}' is too long: {source}")]
    FieldTooLong {
        key: &'static str,
        source: FieldTooLong,
    },
    #[error("no valid broker configuration loaded")]
    NotConfigured,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::BrokerUrl;

    #[test]
    fn bounded_str_accepts_values_up_to_capacity() {
        let at_limit = "x".repeat(BROKER_FIELD_MAX);
        let field: BoundedStr<BROKER_FIELD_MAX> = BoundedStr::new(at_limit.clone()).unwrap();
        assert_eq!(field.as_str(), at_limit);
        assert_eq!(field.len(), BROKER_FIELD_MAX);
    }

    #[test]
    fn bounded_str_rejects_values_over_capacity() {
        let too_long = "x".repeat(BROKER_FIELD_MAX + 1);
        let err = BoundedStr::<BROKER_FIELD_MAX>::new(too_long).unwrap_err();
        assert_eq!(err.len, BROKER_FIELD_MAX + 1);
        assert_eq!(err.max, BROKER_FIELD_MAX);
    }

    #[test]
    fn bounded_str_counts_bytes_not_chars() {
        // Multi-byte UTF-8 must count against the ceiling in bytes.
        let snowman = "\u{2603}".repeat(16); // 3 bytes each = 48 bytes
        assert!(BoundedStr::<BROKER_FIELD_MAX>::new(snowman).is_err());
    }

    #[test]
    fn default_config_is_invalid() {
        let config = ConnectionConfig::default();
        assert!(!config.valid);
        assert!(config.broker_host.is_empty());
    }

    #[test]
    fn apply_broker_url_marks_config_valid() {
        let mut config = ConnectionConfig::default();
        let url = BrokerUrl::parse("mqtts://user:pw@broker.example.com/feeds/toggle").unwrap();
        config.apply_broker_url(url);
        assert!(config.valid);
        assert!(config.use_tls);
        assert_eq!(config.broker_host.as_str(), "broker.example.com");
        assert_eq!(config.broker_topic.as_str(), "feeds/toggle");
    }

    #[test]
    fn clear_resets_everything() {
        let mut config = ConnectionConfig::default();
        let url = BrokerUrl::parse("mqtt://u:p@host/topic").unwrap();
        config.apply_broker_url(url);
        config.network_id = BoundedStr::new("home-net").unwrap();
        config.clear();
        assert!(!config.valid);
        assert!(config.network_id.is_empty());
        assert!(config.broker_host.is_empty());
    }
}
