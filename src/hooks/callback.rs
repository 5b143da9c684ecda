//! Closure-backed hook

use crate::core::config::HookConfig;
use crate::core::error::Result;
use crate::core::hook::Hook;
use crate::core::log_entry::LogEntry;
use crate::core::log_level::LogLevel;
use crate::core::registry::HookFactory;
use std::sync::Arc;

type Callback = dyn Fn(&LogEntry) -> Result<()> + Send + Sync;

/// Runs a closure for every matching entry
///
/// # Examples
///
/// ```
/// use rust_log_pipeline::hooks::CallbackHook;
/// use rust_log_pipeline::{Hook, LogEntry, LogLevel};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let alerts = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&alerts);
/// let hook = CallbackHook::new("pager", vec![LogLevel::Fatal], move |_entry| {
///     counter.fetch_add(1, Ordering::SeqCst);
///     Ok(())
/// });
///
/// hook.fire(&LogEntry::new(LogLevel::Fatal, "disk gone")).unwrap();
/// assert_eq!(alerts.load(Ordering::SeqCst), 1);
/// ```
pub struct CallbackHook {
    name: String,
    levels: Vec<LogLevel>,
    callback: Arc<Callback>,
}

impl CallbackHook {
    pub fn new<F>(name: impl Into<String>, levels: Vec<LogLevel>, callback: F) -> Self
    where
        F: Fn(&LogEntry) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            levels,
            callback: Arc::new(callback),
        }
    }

    /// A factory that builds this hook from a [`HookConfig`], sharing one
    /// callback across every instance it creates
    pub fn factory<F>(callback: F) -> HookFactory
    where
        F: Fn(&LogEntry) -> Result<()> + Send + Sync + 'static,
    {
        let callback: Arc<Callback> = Arc::new(callback);
        Arc::new(move |config: &HookConfig| -> Result<Box<dyn Hook>> {
            Ok(Box::new(CallbackHook {
                name: config.name.clone(),
                levels: config.parsed_levels()?,
                callback: Arc::clone(&callback),
            }))
        })
    }
}

impl Hook for CallbackHook {
    fn fire(&self, entry: &LogEntry) -> Result<()> {
        (self.callback)(entry)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn levels(&self) -> &[LogLevel] {
        &self.levels
    }
}
