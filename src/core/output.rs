//! Output trait for log destinations

use super::error::Result;
use super::formatter::Formatter;
use super::log_entry::LogEntry;
use super::log_level::LogLevel;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// A named sink that accepts log entries
///
/// Implementations guard their own state with their own lock so a slow
/// sink never blocks the manager or its siblings. A disabled output, or
/// an entry below the output's level, is a silent no-op.
pub trait Output: Send + Sync {
    /// Format and write one entry; returns the number of bytes written
    fn write(&self, entry: &LogEntry) -> Result<usize>;

    fn name(&self) -> &str;

    /// Minimum level this output accepts
    fn level(&self) -> LogLevel;

    fn is_enabled(&self) -> bool;

    fn set_enabled(&self, enabled: bool);

    fn flush(&self) -> Result<()>;

    /// Release the sink's resources; later writes fail
    fn close(&self) -> Result<()>;

    /// Whether this output would write the entry
    fn accepts(&self, entry: &LogEntry) -> bool {
        self.is_enabled() && entry.level >= self.level()
    }
}

/// Name, level, enabled flag and formatter shared by the built-in outputs
#[derive(Debug)]
pub struct OutputBase {
    name: String,
    level: AtomicU8,
    enabled: AtomicBool,
    formatter: Formatter,
}

impl OutputBase {
    pub fn new(name: impl Into<String>, level: LogLevel, formatter: Formatter) -> Self {
        Self {
            name: name.into(),
            level: AtomicU8::new(level as u8),
            enabled: AtomicBool::new(true),
            formatter,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> LogLevel {
        let raw = self.level.load(Ordering::Relaxed) as usize;
        LogLevel::ALL.get(raw).copied().unwrap_or_default()
    }

    pub fn set_level(&self, level: LogLevel) {
        self.level.store(level as u8, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn formatter(&self) -> &Formatter {
        &self.formatter
    }

    pub fn accepts(&self, entry: &LogEntry) -> bool {
        self.is_enabled() && entry.level >= self.level()
    }

    /// Format an entry as one newline-terminated line
    pub fn render_line(&self, entry: &LogEntry) -> Result<String> {
        let mut line = self.formatter.format(entry)?;
        line.push('\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::formatter::OutputFormat;

    #[test]
    fn test_base_level_threshold() {
        let base = OutputBase::new("t", LogLevel::Warn, Formatter::new(OutputFormat::Text));

        for level in LogLevel::ALL {
            let entry = LogEntry::new(level, "m");
            assert_eq!(base.accepts(&entry), level >= LogLevel::Warn);
        }
    }

    #[test]
    fn test_base_disabled_accepts_nothing() {
        let base = OutputBase::new("t", LogLevel::Trace, Formatter::default());
        base.set_enabled(false);
        assert!(!base.accepts(&LogEntry::new(LogLevel::Panic, "m")));
    }

    #[test]
    fn test_render_line_appends_newline() {
        let base = OutputBase::new("t", LogLevel::Trace, Formatter::default().with_time(false));
        let line = base.render_line(&LogEntry::new(LogLevel::Info, "hello")).unwrap();
        assert_eq!(line, "[INFO ] hello\n");
    }
}
