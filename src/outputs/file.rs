//! File output backed by a rotating writer

use super::rotating_file::{RotatingWriter, RotationSettings};
use crate::core::config::OutputConfig;
use crate::core::error::{LoggerError, Result};
use crate::core::formatter::Formatter;
use crate::core::log_entry::LogEntry;
use crate::core::log_level::LogLevel;
use crate::core::output::{Output, OutputBase};
use crate::core::registry::{OutputContext, OutputFactory};
use parking_lot::Mutex;
use std::sync::Arc;

pub struct FileOutput {
    base: OutputBase,
    writer: Mutex<RotatingWriter>,
}

impl FileOutput {
    pub fn new(
        name: impl Into<String>,
        level: LogLevel,
        formatter: Formatter,
        settings: RotationSettings,
    ) -> Result<Self> {
        let name = name.into();
        let writer = RotatingWriter::open(settings)
            .map_err(|e| LoggerError::construction(name.clone(), e.to_string()))?;

        Ok(Self {
            base: OutputBase::new(name, level, formatter),
            writer: Mutex::new(writer),
        })
    }

    pub fn settings(&self) -> RotationSettings {
        self.writer.lock().settings().clone()
    }
}

impl Output for FileOutput {
    fn write(&self, entry: &LogEntry) -> Result<usize> {
        if !self.base.accepts(entry) {
            return Ok(0);
        }
        let line = self.base.render_line(entry)?;

        self.writer
            .lock()
            .write(line.as_bytes())
            .map_err(|e| LoggerError::write(self.base.name(), e.to_string()))
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
        self.writer.lock().flush()
    }

    fn close(&self) -> Result<()> {
        self.writer.lock().close()
    }
}

/// Rotation settings from an output's `settings` map, defaults filled in
pub fn rotation_settings(config: &OutputConfig) -> RotationSettings {
    let settings = &config.settings;
    let defaults = RotationSettings::default();

    RotationSettings {
        path: settings
            .get_str("path")
            .filter(|p| !p.is_empty())
            .map(Into::into)
            .unwrap_or(defaults.path),
        max_bytes: settings
            .get_u64("max_size")
            .filter(|mb| *mb > 0)
            .map(|mb| mb.saturating_mul(1024 * 1024))
            .unwrap_or(defaults.max_bytes),
        max_age: settings
            .get_u64("max_age")
            .filter(|days| *days > 0)
            .map(|days| std::time::Duration::from_secs(days.saturating_mul(24 * 3600)))
            .unwrap_or(defaults.max_age),
        max_backups: settings
            .get_u64("max_backups")
            .filter(|n| *n > 0)
            .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
            .unwrap_or(defaults.max_backups),
        compress: settings.get_bool("compress").unwrap_or(false),
        local_time: settings.get_bool("local_time").unwrap_or(false),
    }
}

fn build(config: &OutputConfig, ctx: &OutputContext<'_>) -> Result<Box<dyn Output>> {
    let level = ctx.level_for(config)?;
    // files get escape codes only when asked for explicitly
    let formatter = ctx
        .formatter_for(config)?
        .with_colors(config.settings.get_bool("color").unwrap_or(false));

    let output = FileOutput::new(config.name.clone(), level, formatter, rotation_settings(config))?;
    Ok(Box::new(output))
}

/// Factory registered under the `file` type
pub fn factory() -> OutputFactory {
    Arc::new(build)
}
