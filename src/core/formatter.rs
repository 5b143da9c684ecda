//! Per-output formatting of log entries
//!
//! Formatters are pure: the same entry and options always produce the same
//! text. Each output owns one, built from its configured format.
//! - Json: the whole entry, serialized losslessly
//! - Text: human-readable line with inlined fields
//! - Console: compact line with 3-letter levels and a request annotation
//! - Logfmt: key=value pairs

use super::error::{LoggerError, Result};
use super::log_context::{format_fields, FieldValue};
use super::log_entry::LogEntry;
use super::timestamp::TimestampFormat;
use colored::Colorize;
use std::fmt;
use std::str::FromStr;

/// Output format for log entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    ///
    /// Example: `[2025-01-08T10:30:45.000Z] [INFO ] [api] Request processed user=7`
    #[default]
    Text,

    /// JSON format for machine processing
    Json,

    /// Compact console format
    ///
    /// Example: `10:30:45.000 INF [api] Request processed (req=abc user=u1) status=200`
    Console,

    /// Logfmt format (key=value pairs)
    Logfmt,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
            OutputFormat::Console => "console",
            OutputFormat::Logfmt => "logfmt",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "console" => Ok(OutputFormat::Console),
            "logfmt" => Ok(OutputFormat::Logfmt),
            _ => Err(format!("Invalid log format: '{}'", s)),
        }
    }
}

/// A configured formatter
#[derive(Debug, Clone)]
pub struct Formatter {
    format: OutputFormat,
    colors: bool,
    show_time: bool,
    show_caller: bool,
    timestamp_format: TimestampFormat,
    component_field: String,
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(OutputFormat::Text)
    }
}

impl Formatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colors: false,
            show_time: true,
            show_caller: false,
            timestamp_format: TimestampFormat::default(),
            component_field: "component".to_string(),
        }
    }

    #[must_use]
    pub fn with_colors(mut self, colors: bool) -> Self {
        self.colors = colors;
        self
    }

    #[must_use]
    pub fn with_time(mut self, show_time: bool) -> Self {
        self.show_time = show_time;
        self
    }

    #[must_use]
    pub fn with_caller(mut self, show_caller: bool) -> Self {
        self.show_caller = show_caller;
        self
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    /// Key under which the component is emitted
    #[must_use]
    pub fn with_component_field(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        if !field.is_empty() {
            self.component_field = field;
        }
        self
    }

    pub fn output_format(&self) -> OutputFormat {
        self.format
    }

    pub fn colors(&self) -> bool {
        self.colors
    }

    /// Format a log entry; the result carries no trailing newline
    pub fn format(&self, entry: &LogEntry) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.format_json(entry),
            OutputFormat::Text => Ok(self.format_text(entry)),
            OutputFormat::Console => Ok(self.format_console(entry)),
            OutputFormat::Logfmt => Ok(self.format_logfmt(entry)),
        }
    }

    fn format_json(&self, entry: &LogEntry) -> Result<String> {
        let mut value = serde_json::to_value(entry)?;
        if self.component_field != "component" {
            if let Some(obj) = value.as_object_mut() {
                if let Some(component) = obj.remove("component") {
                    obj.insert(self.component_field.clone(), component);
                }
            }
        }
        serde_json::to_string(&value).map_err(|e| LoggerError::other(format!("JSON formatter: {}", e)))
    }

    fn paint_level(&self, label: String, entry: &LogEntry) -> String {
        if self.colors {
            label.color(entry.level.color_code()).to_string()
        } else {
            label
        }
    }

    /// Annotation key=value pairs shared by text and console
    fn trailer(&self, entry: &LogEntry, parts: &mut Vec<String>) {
        if !entry.fields.is_empty() {
            parts.push(format_fields(&entry.fields));
        }
        if let Some(ref error) = entry.error {
            parts.push(format!("error=\"{}\"", error.message));
        }
        if let Some(duration) = entry.duration {
            parts.push(format!("duration={:?}", duration));
        }
        if self.show_caller {
            if let Some(ref source) = entry.source {
                parts.push(format!("caller={}:{}", source.file, source.line));
            }
        }
    }

    fn format_text(&self, entry: &LogEntry) -> String {
        let mut parts = Vec::new();

        if self.show_time {
            parts.push(format!("[{}]", self.timestamp_format.format(&entry.timestamp)));
        }
        let level = self.paint_level(format!("{:5}", entry.level.to_str()), entry);
        parts.push(format!("[{}]", level));
        if !entry.component.is_empty() {
            parts.push(format!("[{}]", entry.component));
        }
        parts.push(entry.message.clone());

        for (key, value) in [
            ("request_id", &entry.request_id),
            ("user_id", &entry.user_id),
            ("trace_id", &entry.trace_id),
            ("span_id", &entry.span_id),
        ] {
            if let Some(v) = value {
                parts.push(format!("{}={}", key, v));
            }
        }
        self.trailer(entry, &mut parts);

        parts.join(" ")
    }

    fn format_console(&self, entry: &LogEntry) -> String {
        let mut parts = Vec::new();

        if self.show_time {
            let stamp = match self.timestamp_format {
                TimestampFormat::Iso8601 => entry.timestamp.format("%H:%M:%S%.3f").to_string(),
                ref other => other.format(&entry.timestamp),
            };
            parts.push(stamp);
        }
        parts.push(self.paint_level(entry.level.short_code().to_string(), entry));
        if !entry.component.is_empty() {
            parts.push(format!("[{}]", entry.component));
        }
        parts.push(entry.message.clone());

        let mut ids = Vec::new();
        if let Some(ref id) = entry.request_id {
            ids.push(format!("req={}", id));
        }
        if let Some(ref id) = entry.user_id {
            ids.push(format!("user={}", id));
        }
        if !ids.is_empty() {
            parts.push(format!("({})", ids.join(" ")));
        }
        self.trailer(entry, &mut parts);

        parts.join(" ")
    }

    fn format_logfmt(&self, entry: &LogEntry) -> String {
        let mut parts = Vec::new();

        if self.show_time {
            parts.push(format!(
                "timestamp={}",
                escape_logfmt_value(&self.timestamp_format.format(&entry.timestamp))
            ));
        }
        parts.push(format!("level={}", entry.level.as_config_str()));
        parts.push(format!("message={}", quote_logfmt_value(&entry.message)));
        if !entry.component.is_empty() {
            parts.push(format!(
                "{}={}",
                escape_logfmt_key(&self.component_field),
                escape_logfmt_value(&entry.component)
            ));
        }
        for (key, value) in [
            ("request_id", &entry.request_id),
            ("user_id", &entry.user_id),
            ("trace_id", &entry.trace_id),
            ("span_id", &entry.span_id),
        ] {
            if let Some(v) = value {
                parts.push(format!("{}={}", key, escape_logfmt_value(v)));
            }
        }

        let mut keys: Vec<&String> = entry.fields.keys().collect();
        keys.sort();
        for key in keys {
            let formatted_value = match &entry.fields[key] {
                FieldValue::String(s) => quote_logfmt_value(s),
                other => other.to_string(),
            };
            parts.push(format!("{}={}", escape_logfmt_key(key), formatted_value));
        }

        if let Some(ref error) = entry.error {
            parts.push(format!("error={}", quote_logfmt_value(&error.message)));
        }
        if let Some(duration) = entry.duration {
            parts.push(format!("duration_ms={}", duration.as_millis()));
        }
        if self.show_caller {
            if let Some(ref source) = entry.source {
                parts.push(format!(
                    "caller={}",
                    escape_logfmt_value(&format!("{}:{}", source.file, source.line))
                ));
            }
        }

        parts.join(" ")
    }
}

/// Escape a logfmt key (remove spaces and special chars)
fn escape_logfmt_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Escape a logfmt value (quote if contains spaces)
fn escape_logfmt_value(value: &str) -> String {
    if value.contains(' ') || value.contains('"') || value.contains('=') {
        quote_logfmt_value(value)
    } else {
        value.to_string()
    }
}

fn quote_logfmt_value(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log_entry::ErrorInfo;
    use crate::core::LogLevel;

    fn sample() -> LogEntry {
        LogEntry::new(LogLevel::Info, "User logged in")
            .with_component("auth")
            .with_field("user_id", 123)
            .with_field("action", "login")
    }

    #[test]
    fn test_text_format() {
        let line = Formatter::new(OutputFormat::Text).format(&sample()).unwrap();

        assert!(line.contains("[INFO ]"));
        assert!(line.contains("[auth]"));
        assert!(line.contains("User logged in"));
        assert!(line.contains("action=login user_id=123"));
    }

    #[test]
    fn test_text_without_colors_has_no_escape_codes() {
        let line = Formatter::new(OutputFormat::Text)
            .with_colors(false)
            .format(&sample())
            .unwrap();
        assert!(!line.contains('\x1b'));
    }

    #[test]
    fn test_json_is_lossless() {
        let entry = sample()
            .with_error(ErrorInfo::new("boom"))
            .with_location("src/auth.rs", 7, Some("auth::login"));
        let json = Formatter::new(OutputFormat::Json).format(&entry).unwrap();

        let back: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_json_custom_component_field() {
        let json = Formatter::new(OutputFormat::Json)
            .with_component_field("service")
            .format(&sample())
            .unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["service"], "auth");
        assert!(parsed.get("component").is_none());
    }

    #[test]
    fn test_console_compresses_ids_and_level() {
        let mut entry = sample();
        entry.request_id = Some("abc".into());
        entry.user_id = Some("u1".into());

        let line = Formatter::new(OutputFormat::Console)
            .with_time(false)
            .format(&entry)
            .unwrap();
        assert!(line.starts_with("INF [auth] User logged in (req=abc user=u1)"));
    }

    #[test]
    fn test_logfmt_escape_special_chars() {
        let entry = LogEntry::new(LogLevel::Debug, "Query executed")
            .with_field("query", "SELECT * FROM users WHERE id=1");
        let line = Formatter::new(OutputFormat::Logfmt).format(&entry).unwrap();

        assert!(line.contains("level=debug"));
        assert!(line.contains("query=\"SELECT * FROM users WHERE id=1\""));
    }

    #[test]
    fn test_caller_is_shown_when_enabled() {
        let entry = sample().with_location("src/main.rs", 12, None);
        let line = Formatter::new(OutputFormat::Text)
            .with_caller(true)
            .format(&entry)
            .unwrap();
        assert!(line.contains("caller=src/main.rs:12"));
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("plain".parse::<OutputFormat>(), Ok(OutputFormat::Text));
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
