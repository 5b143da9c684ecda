//! Audit hook: appends matching entries as JSON lines

use crate::core::config::HookConfig;
use crate::core::error::{LoggerError, Result};
use crate::core::hook::Hook;
use crate::core::log_entry::LogEntry;
use crate::core::log_level::LogLevel;
use crate::core::registry::HookFactory;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_AUDIT_PATH: &str = "logs/audit.log";

pub struct AuditHook {
    name: String,
    levels: Vec<LogLevel>,
    path: PathBuf,
    file: Mutex<File>,
}

impl AuditHook {
    pub fn new(name: impl Into<String>, levels: Vec<LogLevel>, path: impl AsRef<Path>) -> Result<Self> {
        let name = name.into();
        let path = path.as_ref().to_path_buf();

        let open = || -> std::io::Result<File> {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            OpenOptions::new().create(true).append(true).open(&path)
        };
        let file = open().map_err(|e| {
            LoggerError::construction(name.clone(), format!("cannot open '{}': {}", path.display(), e))
        })?;

        Ok(Self {
            name,
            levels,
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Hook for AuditHook {
    fn fire(&self, entry: &LogEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        self.file
            .lock()
            .write_all(line.as_bytes())
            .map_err(|e| LoggerError::hook(&self.name, e.to_string()))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn levels(&self) -> &[LogLevel] {
        &self.levels
    }
}

fn build(config: &HookConfig) -> Result<Box<dyn Hook>> {
    let path = config
        .settings
        .get_str("path")
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_AUDIT_PATH);
    Ok(Box::new(AuditHook::new(config.name.clone(), config.parsed_levels()?, path)?))
}

/// Factory registered under the `audit` type
pub fn factory() -> HookFactory {
    Arc::new(build)
}
