//! Test doubles shared by the output, manager and logger tests

use crate::core::error::{LoggerError, Result};
use crate::core::log_entry::LogEntry;
use crate::core::log_level::LogLevel;
use crate::core::output::Output;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Cloneable in-memory writer
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Output that records what it was asked to do
pub struct RecordingOutput {
    name: String,
    level: LogLevel,
    enabled: AtomicBool,
    fail_writes: bool,
    fail_close: bool,
    writes: AtomicUsize,
    flushes: AtomicUsize,
    closed: AtomicBool,
    entries: Mutex<Vec<LogEntry>>,
}

impl RecordingOutput {
    fn build(name: &str, level: LogLevel, fail_writes: bool, fail_close: bool) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            level,
            enabled: AtomicBool::new(true),
            fail_writes,
            fail_close,
            writes: AtomicUsize::new(0),
            flushes: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            entries: Mutex::new(Vec::new()),
        })
    }

    pub fn new(name: &str) -> Arc<Self> {
        Self::build(name, LogLevel::Trace, false, false)
    }

    pub fn with_level(name: &str, level: LogLevel) -> Arc<Self> {
        Self::build(name, level, false, false)
    }

    /// Every write fails
    pub fn failing(name: &str) -> Arc<Self> {
        Self::build(name, LogLevel::Trace, true, false)
    }

    /// Close fails
    pub fn failing_close(name: &str) -> Arc<Self> {
        Self::build(name, LogLevel::Trace, false, true)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries.lock().iter().map(|e| e.message.clone()).collect()
    }
}

impl Output for RecordingOutput {
    fn write(&self, entry: &LogEntry) -> Result<usize> {
        if !self.accepts(entry) {
            return Ok(0);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(LoggerError::write(&self.name, "sink unavailable"));
        }
        self.entries.lock().push(entry.clone());
        Ok(entry.message.len())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn level(&self) -> LogLevel {
        self.level
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn flush(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close {
            return Err(LoggerError::write(&self.name, "close failed"));
        }
        Ok(())
    }
}
