//! Timestamp formatting utilities
//!
//! Provides standardized, configurable timestamp formats for log output.
//! Supports ISO 8601, RFC 3339, Unix timestamps, and custom formats.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, Utc};
use std::fmt::Write;

/// Standardized timestamp format options
///
/// Selected from the `time_format` configuration string with
/// [`TimestampFormat::from_config`]: the names `iso8601`, `iso8601_micros`,
/// `rfc3339`, `unix`, `unix_millis` and `unix_micros` select a preset, an
/// empty string selects the default and anything else is taken as a
/// strftime pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TimestampFormat {
    /// ISO 8601 with milliseconds: `2025-01-08T10:30:45.123Z`
    #[default]
    Iso8601,

    /// ISO 8601 with microseconds: `2025-01-08T10:30:45.123456Z`
    Iso8601Micros,

    /// RFC 3339 format: `2025-01-08T10:30:45+00:00`
    Rfc3339,

    /// Unix timestamp in seconds: `1736332245`
    Unix,

    /// Unix timestamp in milliseconds: `1736332245123`
    UnixMillis,

    /// Unix timestamp in microseconds: `1736332245123456`
    UnixMicros,

    /// Custom strftime format
    Custom(String),
}

impl TimestampFormat {
    /// Resolve a configuration string into a format
    pub fn from_config(spec: &str) -> Self {
        match spec.trim().to_ascii_lowercase().as_str() {
            "" | "iso8601" => TimestampFormat::Iso8601,
            "iso8601_micros" => TimestampFormat::Iso8601Micros,
            "rfc3339" => TimestampFormat::Rfc3339,
            "unix" => TimestampFormat::Unix,
            "unix_millis" => TimestampFormat::UnixMillis,
            "unix_micros" => TimestampFormat::UnixMicros,
            _ => TimestampFormat::Custom(spec.to_string()),
        }
    }

    /// Check that a configuration string is usable
    pub fn validate_config(spec: &str) -> std::result::Result<(), String> {
        match Self::from_config(spec) {
            TimestampFormat::Custom(pattern) => {
                if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
                    Err(format!("invalid strftime pattern '{}'", pattern))
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    /// Format a `DateTime<Utc>` according to this format
    #[must_use]
    pub fn format(&self, datetime: &DateTime<Utc>) -> String {
        match self {
            TimestampFormat::Iso8601 => datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            TimestampFormat::Iso8601Micros => datetime.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
            TimestampFormat::Rfc3339 => datetime.to_rfc3339(),
            TimestampFormat::Unix => datetime.timestamp().to_string(),
            TimestampFormat::UnixMillis => datetime.timestamp_millis().to_string(),
            TimestampFormat::UnixMicros => datetime.timestamp_micros().to_string(),
            TimestampFormat::Custom(pattern) => {
                // A bad pattern yields fmt::Error rather than a panic here
                let mut out = String::new();
                if write!(out, "{}", datetime.format(pattern)).is_err() {
                    return datetime.to_rfc3339();
                }
                out
            }
        }
    }

    /// Format in the local timezone (custom patterns only; presets stay UTC)
    #[must_use]
    pub fn format_local(&self, datetime: &DateTime<Utc>) -> String {
        match self {
            TimestampFormat::Custom(pattern) => {
                let local: DateTime<Local> = datetime.with_timezone(&Local);
                let mut out = String::new();
                if write!(out, "{}", local.format(pattern)).is_err() {
                    return local.to_rfc3339();
                }
                out
            }
            other => other.format(datetime),
        }
    }

    /// Check if this is a Unix-based numeric format
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            TimestampFormat::Unix | TimestampFormat::UnixMillis | TimestampFormat::UnixMicros
        )
    }
}
