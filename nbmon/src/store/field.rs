//! Typed operator edits of a device.

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, NaiveDateTime, Utc};
use secrecy::SecretString;

use crate::error::ConfigurationError;

/// Highest port the edit command accepts (end of the registered range).
pub const MAX_PORT: u16 = 49151;

/// Format of a `last_seen` edit, read as UTC.
pub const LAST_SEEN_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single-field device update.
///
/// This is the closed set of edits an operator can make; each variant maps
/// to exactly one column and is committed on its own.
#[derive(Debug, Clone)]
pub enum DeviceField {
    Platform(String),
    Address(String),
    Port(u16),
    Description(String),
    Username(String),
    Password(SecretString),
    Secret(Option<SecretString>),
    ActivelyPolled(bool),
    MissedPolls(u32),
    ConfigChanges(u32),
    /// `None` marks the device as never seen.
    LastSeen(Option<DateTime<Utc>>),
}

impl DeviceField {
    /// Field names accepted by [`DeviceField::parse`].
    pub const NAMES: &'static [&'static str] = &[
        "platform",
        "address",
        "port",
        "description",
        "username",
        "password",
        "secret",
        "actively_polled",
        "missed_polls",
        "config_changes",
        "last_seen",
    ];

    /// Alternative names and the canonical name each stands for.
    pub const ALIASES: &'static [(&'static str, &'static str)] = &[
        ("device_type", "platform"),
        ("ip", "address"),
        ("actively_poll", "actively_polled"),
    ];

    /// Parse and validate an edit given as `name` and textual `value`.
    ///
    /// `device_type`, `ip` and `actively_poll` are accepted as aliases.
    pub fn parse(name: &str, value: &str) -> Result<Self, ConfigurationError> {
        let field = match name {
            "platform" | "device_type" => {
                let tag = non_empty("platform", value)?;
                DeviceField::Platform(tag)
            }
            "address" | "ip" => DeviceField::Address(validate_address(value)?),
            "port" => DeviceField::Port(validate_port(value)?),
            "description" => DeviceField::Description(value.to_string()),
            "username" => DeviceField::Username(non_empty("username", value)?),
            "password" => DeviceField::Password(SecretString::from(non_empty("password", value)?)),
            "secret" => DeviceField::Secret(if value.is_empty() {
                None
            } else {
                Some(SecretString::from(value.to_string()))
            }),
            "actively_polled" | "actively_poll" => {
                DeviceField::ActivelyPolled(parse_bool("actively_polled", value)?)
            }
            "missed_polls" => DeviceField::MissedPolls(parse_counter("missed_polls", value)?),
            "config_changes" => {
                DeviceField::ConfigChanges(parse_counter("config_changes", value)?)
            }
            "last_seen" => DeviceField::LastSeen(parse_last_seen(value)?),
            _ => {
                return Err(ConfigurationError::InvalidAttribute {
                    field: "field",
                    message: format!("unknown field '{}'", name),
                });
            }
        };
        Ok(field)
    }

    /// Canonical field name.
    pub fn name(&self) -> &'static str {
        match self {
            DeviceField::Platform(_) => "platform",
            DeviceField::Address(_) => "address",
            DeviceField::Port(_) => "port",
            DeviceField::Description(_) => "description",
            DeviceField::Username(_) => "username",
            DeviceField::Password(_) => "password",
            DeviceField::Secret(_) => "secret",
            DeviceField::ActivelyPolled(_) => "actively_polled",
            DeviceField::MissedPolls(_) => "missed_polls",
            DeviceField::ConfigChanges(_) => "config_changes",
            DeviceField::LastSeen(_) => "last_seen",
        }
    }
}

impl fmt::Display for DeviceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceField::Platform(v)
            | DeviceField::Address(v)
            | DeviceField::Description(v)
            | DeviceField::Username(v) => write!(f, "{} = \"{}\"", self.name(), v),
            DeviceField::Port(v) => write!(f, "port = {}", v),
            DeviceField::Password(_) => f.write_str("password = <redacted>"),
            DeviceField::Secret(Some(_)) => f.write_str("secret = <redacted>"),
            DeviceField::Secret(None) => f.write_str("secret = <none>"),
            DeviceField::ActivelyPolled(v) => write!(f, "actively_polled = {}", v),
            DeviceField::MissedPolls(v) => write!(f, "missed_polls = {}", v),
            DeviceField::ConfigChanges(v) => write!(f, "config_changes = {}", v),
            DeviceField::LastSeen(Some(ts)) => {
                write!(f, "last_seen = {} UTC", ts.format(LAST_SEEN_FORMAT))
            }
            DeviceField::LastSeen(None) => f.write_str("last_seen = never"),
        }
    }
}

fn non_empty(field: &'static str, value: &str) -> Result<String, ConfigurationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigurationError::InvalidAttribute {
            field,
            message: "must not be empty".to_string(),
        });
    }
    Ok(value.to_string())
}

/// Accept an IP literal or a DNS host name.
pub(crate) fn validate_address(value: &str) -> Result<String, ConfigurationError> {
    let value = value.trim();
    if value.parse::<IpAddr>().is_ok() {
        return Ok(value.to_string());
    }

    let valid_host = !value.is_empty()
        && value.len() <= 253
        && value
            .split('.')
            .all(|label| {
                !label.is_empty()
                    && label.len() <= 63
                    && !label.starts_with('-')
                    && !label.ends_with('-')
                    && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            });

    if valid_host {
        Ok(value.to_string())
    } else {
        Err(ConfigurationError::InvalidAttribute {
            field: "address",
            message: format!("'{}' is neither an IP address nor a host name", value),
        })
    }
}

pub(crate) fn validate_port(value: &str) -> Result<u16, ConfigurationError> {
    match value.trim().parse::<u16>() {
        Ok(port) if (1..=MAX_PORT).contains(&port) => Ok(port),
        _ => Err(ConfigurationError::InvalidAttribute {
            field: "port",
            message: format!("'{}' is not in 1-{}", value, MAX_PORT),
        }),
    }
}

fn parse_bool(field: &'static str, value: &str) -> Result<bool, ConfigurationError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "on" => Ok(true),
        "false" | "no" | "n" | "0" | "off" => Ok(false),
        other => Err(ConfigurationError::InvalidAttribute {
            field,
            message: format!("'{}' is not a boolean", other),
        }),
    }
}

fn parse_counter(field: &'static str, value: &str) -> Result<u32, ConfigurationError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| ConfigurationError::InvalidAttribute {
            field,
            message: format!("'{}' is not a non-negative integer", value),
        })
}

/// Empty, `never` or `none` clears the timestamp.
fn parse_last_seen(value: &str) -> Result<Option<DateTime<Utc>>, ConfigurationError> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("never") || value.eq_ignore_ascii_case("none")
    {
        return Ok(None);
    }
    NaiveDateTime::parse_from_str(value, LAST_SEEN_FORMAT)
        .map(|ts| Some(ts.and_utc()))
        .map_err(|_| ConfigurationError::InvalidAttribute {
            field: "last_seen",
            message: format!("'{}' is not YYYY-MM-DD HH:MM:SS", value),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert!(matches!(
            DeviceField::parse("device_type", "cisco_ios").unwrap(),
            DeviceField::Platform(ref p) if p == "cisco_ios"
        ));
        assert!(matches!(
            DeviceField::parse("ip", "10.1.1.1").unwrap(),
            DeviceField::Address(ref a) if a == "10.1.1.1"
        ));
        assert!(matches!(
            DeviceField::parse("actively_poll", "no").unwrap(),
            DeviceField::ActivelyPolled(false)
        ));
    }

    #[test]
    fn test_address_validation() {
        assert!(validate_address("192.0.2.10").is_ok());
        assert!(validate_address("2001:db8::1").is_ok());
        assert!(validate_address("core-sw1.example.net").is_ok());
        assert!(validate_address("").is_err());
        assert!(validate_address("bad host").is_err());
        assert!(validate_address("-edge").is_err());
    }

    #[test]
    fn test_port_range() {
        assert_eq!(validate_port("22").unwrap(), 22);
        assert_eq!(validate_port("49151").unwrap(), 49151);
        assert!(validate_port("0").is_err());
        assert!(validate_port("49152").is_err());
        assert!(validate_port("ssh").is_err());
    }

    #[test]
    fn test_empty_secret_clears() {
        assert!(matches!(
            DeviceField::parse("secret", "").unwrap(),
            DeviceField::Secret(None)
        ));
    }

    #[test]
    fn test_unknown_field() {
        let err = DeviceField::parse("hostname", "r1").unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn test_names_and_aliases_parse() {
        let sample = |name: &str| match name {
            "port" => "22",
            "actively_polled" | "actively_poll" => "yes",
            "missed_polls" | "config_changes" => "3",
            "last_seen" => "never",
            "address" | "ip" => "192.0.2.1",
            _ => "x",
        };
        for name in DeviceField::NAMES {
            assert_eq!(DeviceField::parse(name, sample(*name)).unwrap().name(), *name);
        }
        for (alias, canonical) in DeviceField::ALIASES {
            assert_eq!(DeviceField::parse(alias, sample(*alias)).unwrap().name(), *canonical);
        }
    }

    #[test]
    fn test_last_seen_edit() {
        use chrono::TimeZone;

        assert!(matches!(
            DeviceField::parse("last_seen", "").unwrap(),
            DeviceField::LastSeen(None)
        ));
        assert!(matches!(
            DeviceField::parse("last_seen", "NEVER").unwrap(),
            DeviceField::LastSeen(None)
        ));

        let field = DeviceField::parse("last_seen", "2024-01-02 03:04:05").unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert!(matches!(field, DeviceField::LastSeen(Some(ts)) if ts == expected));
        assert_eq!(field.to_string(), "last_seen = 2024-01-02 03:04:05 UTC");

        assert!(DeviceField::parse("last_seen", "yesterday").is_err());
    }

    #[test]
    fn test_display_redacts_credentials() {
        let field = DeviceField::parse("password", "hunter2").unwrap();
        assert_eq!(field.to_string(), "password = <redacted>");
    }
}
