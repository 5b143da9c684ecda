//! Console output

use crate::core::config::OutputConfig;
use crate::core::error::{LoggerError, Result};
use crate::core::formatter::Formatter;
use crate::core::log_entry::LogEntry;
use crate::core::log_level::LogLevel;
use crate::core::output::{Output, OutputBase};
use crate::core::registry::{OutputContext, OutputFactory};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

/// Writes formatted entries to stdout (or stderr, or an injected writer)
///
/// No internal buffering: every entry is written with one `write_all`.
pub struct ConsoleOutput {
    base: OutputBase,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleOutput {
    pub fn new(name: impl Into<String>, level: LogLevel, formatter: Formatter) -> Self {
        Self::with_writer(name, level, formatter, Box::new(std::io::stdout()))
    }

    pub fn stderr(name: impl Into<String>, level: LogLevel, formatter: Formatter) -> Self {
        Self::with_writer(name, level, formatter, Box::new(std::io::stderr()))
    }

    /// Write to an arbitrary sink instead of a standard stream
    pub fn with_writer(
        name: impl Into<String>,
        level: LogLevel,
        formatter: Formatter,
        writer: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            base: OutputBase::new(name, level, formatter),
            writer: Mutex::new(writer),
        }
    }
}

impl Output for ConsoleOutput {
    fn write(&self, entry: &LogEntry) -> Result<usize> {
        if !self.base.accepts(entry) {
            return Ok(0);
        }
        let line = self.base.render_line(entry)?;

        let mut writer = self.writer.lock();
        writer
            .write_all(line.as_bytes())
            .map_err(|e| LoggerError::write(self.base.name(), e.to_string()))?;
        Ok(line.len())
    }

    fn name(&self) -> &str {
        self.base.name()
    }

    fn level(&self) -> LogLevel {
        self.base.level()
    }

    fn is_enabled(&self) -> bool {
        self.base.is_enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        self.base.set_enabled(enabled);
    }

    fn flush(&self) -> Result<()> {
        self.writer
            .lock()
            .flush()
            .map_err(|e| LoggerError::write(self.base.name(), e.to_string()))
    }

    fn close(&self) -> Result<()> {
        self.flush()
    }
}

fn build(config: &OutputConfig, ctx: &OutputContext<'_>) -> Result<Box<dyn Output>> {
    let level = ctx.level_for(config)?;
    let formatter = ctx.formatter_for(config)?;

    let output = match config.settings.get_str("stream").unwrap_or("stdout") {
        "stdout" => ConsoleOutput::new(config.name.clone(), level, formatter),
        "stderr" => ConsoleOutput::stderr(config.name.clone(), level, formatter),
        other => {
            return Err(LoggerError::config(
                format!("outputs.{}", config.name),
                format!("unknown console stream '{}'", other),
            ))
        }
    };
    Ok(Box::new(output))
}

/// Factory registered under the `console` type
pub fn factory() -> OutputFactory {
    Arc::new(build)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::LogConfig;
    use crate::core::registry::Registry;
    use crate::outputs::testing::SharedBuffer;

    fn plain() -> Formatter {
        Formatter::default().with_time(false)
    }

    #[test]
    fn test_writes_formatted_line() {
        let buffer = SharedBuffer::new();
        let output = ConsoleOutput::with_writer("c", LogLevel::Info, plain(), Box::new(buffer.clone()));

        let bytes = output
            .write(&LogEntry::new(LogLevel::Warn, "disk low").with_component("fs"))
            .unwrap();

        assert_eq!(buffer.contents(), "[WARN ] [fs] disk low\n");
        assert_eq!(bytes, buffer.contents().len());
    }

    #[test]
    fn test_below_level_and_disabled_are_silent() {
        let buffer = SharedBuffer::new();
        let output = ConsoleOutput::with_writer("c", LogLevel::Error, plain(), Box::new(buffer.clone()));

        assert_eq!(output.write(&LogEntry::new(LogLevel::Info, "skip")).unwrap(), 0);
        output.set_enabled(false);
        assert_eq!(output.write(&LogEntry::new(LogLevel::Panic, "skip")).unwrap(), 0);
        assert!(buffer.contents().is_empty());
    }

    #[test]
    fn test_factory_rejects_unknown_stream() {
        let config = LogConfig::empty();
        let registry = Registry::new("output");
        let ctx = OutputContext::new(&config, &registry);

        let cfg = OutputConfig::new("c", "console").with_setting("stream", "printer");
        assert!(build(&cfg, &ctx).err().unwrap().is_configuration());
    }
}
