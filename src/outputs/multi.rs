//! Fan-out to an ordered list of outputs

use crate::core::config::OutputConfig;
use crate::core::error::{ErrorList, LoggerError, Result};
use crate::core::log_entry::LogEntry;
use crate::core::log_level::LogLevel;
use crate::core::output::Output;
use crate::core::registry::{OutputContext, OutputFactory};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Writes every entry to each member; one member failing never skips the rest
pub struct MultiOutput {
    name: String,
    level: LogLevel,
    enabled: AtomicBool,
    members: RwLock<Vec<Arc<dyn Output>>>,
}

impl MultiOutput {
    pub fn new(name: impl Into<String>, level: LogLevel, members: Vec<Arc<dyn Output>>) -> Self {
        Self {
            name: name.into(),
            level,
            enabled: AtomicBool::new(true),
            members: RwLock::new(members),
        }
    }

    pub fn add_output(&self, output: Arc<dyn Output>) {
        self.members.write().push(output);
    }

    /// Detach a member by name; the caller decides whether to close it
    pub fn remove_output(&self, name: &str) -> Option<Arc<dyn Output>> {
        let mut members = self.members.write();
        let idx = members.iter().position(|m| m.name() == name)?;
        Some(members.remove(idx))
    }

    pub fn output_names(&self) -> Vec<String> {
        self.members
            .read()
            .iter()
            .map(|m| m.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }

    fn each<F>(&self, mut op: F) -> Result<()>
    where
        F: FnMut(&dyn Output) -> Result<()>,
    {
        let members = self.members.read().clone();
        let mut errors = ErrorList::new();
        for member in &members {
            if let Err(e) = op(member.as_ref()) {
                errors.push(member.name(), e);
            }
        }
        errors.into_result()
    }
}

impl Output for MultiOutput {
    fn write(&self, entry: &LogEntry) -> Result<usize> {
        if !self.accepts(entry) {
            return Ok(0);
        }
        let mut written = 0;
        self.each(|member| {
            written += member.write(entry)?;
            Ok(())
        })?;
        Ok(written)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn level(&self) -> LogLevel {
        self.level
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    fn flush(&self) -> Result<()> {
        self.each(|member| member.flush())
    }

    fn close(&self) -> Result<()> {
        self.each(|member| member.close())
    }
}

fn build(config: &OutputConfig, ctx: &OutputContext<'_>) -> Result<Box<dyn Output>> {
    let component = format!("outputs.{}", config.name);

    let member_values = match config.settings.get("outputs") {
        Some(serde_json::Value::Array(items)) => items.clone(),
        Some(_) => {
            return Err(LoggerError::config(component, "\"outputs\" must be a list"));
        }
        None => Vec::new(),
    };

    let mut members: Vec<Arc<dyn Output>> = Vec::with_capacity(member_values.len());
    for (idx, value) in member_values.into_iter().enumerate() {
        let built = serde_json::from_value::<OutputConfig>(value)
            .map_err(|e| LoggerError::config(component.clone(), format!("invalid member {}: {}", idx, e)))
            .and_then(|mut member| {
                if member.name.is_empty() {
                    member.name = format!("{}.{}", config.name, idx);
                }
                ctx.build(&member)
            });

        match built {
            Ok(output) => members.push(Arc::from(output)),
            Err(e) => {
                for member in &members {
                    let _ = member.close();
                }
                return Err(e);
            }
        }
    }

    let level = if config.level.trim().is_empty() {
        LogLevel::Trace
    } else {
        ctx.level_for(config)?
    };
    Ok(Box::new(MultiOutput::new(config.name.clone(), level, members)))
}

/// Factory registered under the `multi` type
pub fn factory() -> OutputFactory {
    Arc::new(build)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outputs::testing::RecordingOutput;

    #[test]
    fn test_fan_out_reaches_every_member_despite_failures() {
        let a = RecordingOutput::new("a");
        let b = RecordingOutput::failing("b");
        let c = RecordingOutput::new("c");
        let members: Vec<Arc<dyn Output>> = vec![a.clone(), b.clone(), c.clone()];
        let multi = MultiOutput::new("all", LogLevel::Trace, members);

        let err = multi.write(&LogEntry::new(LogLevel::Info, "m")).unwrap_err();

        assert_eq!(a.writes() + b.writes() + c.writes(), 3);
        match err {
            LoggerError::Aggregate(list) => assert_eq!(list.sources(), vec!["b"]),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_add_and_remove_by_name() {
        let multi = MultiOutput::new("all", LogLevel::Trace, Vec::new());
        multi.add_output(RecordingOutput::new("x"));
        multi.add_output(RecordingOutput::new("y"));
        assert_eq!(multi.output_names(), vec!["x", "y"]);

        let removed = multi.remove_output("x").unwrap();
        assert_eq!(removed.name(), "x");
        assert_eq!(multi.output_names(), vec!["y"]);
        assert!(multi.remove_output("missing").is_none());
    }

    #[test]
    fn test_close_reaches_every_member() {
        let a = RecordingOutput::new("a");
        let b = RecordingOutput::new("b");
        let members: Vec<Arc<dyn Output>> = vec![a.clone(), b.clone()];
        let multi = MultiOutput::new("all", LogLevel::Trace, members);

        multi.close().unwrap();
        assert!(a.is_closed() && b.is_closed());
    }
}
