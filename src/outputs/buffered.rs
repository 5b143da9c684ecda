//! Batching wrapper around another output
//!
//! Entries accumulate in memory and are handed to the wrapped output when
//! the batch fills, on a background timer, on `flush` and on `close`. Every
//! flush runs while holding the buffer lock, so the timer and writers never
//! flush concurrently.

use crate::core::config::OutputConfig;
use crate::core::error::{ErrorList, LoggerError, Result};
use crate::core::log_entry::LogEntry;
use crate::core::log_level::LogLevel;
use crate::core::output::Output;
use crate::core::registry::{OutputContext, OutputFactory};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

struct Batch {
    inner: Arc<dyn Output>,
    entries: Mutex<Vec<LogEntry>>,
}

impl Batch {
    /// Drain the buffer into the wrapped output; caller holds the lock
    fn drain(&self, entries: &mut Vec<LogEntry>) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut errors = ErrorList::new();
        let mut written = 0;
        for entry in entries.drain(..) {
            match self.inner.write(&entry) {
                Ok(bytes) => written += bytes,
                Err(e) => errors.push(self.inner.name(), e),
            }
        }
        if let Err(e) = self.inner.flush() {
            errors.push(self.inner.name(), e);
        }

        errors.into_result().map(|_| written)
    }

    fn flush(&self) -> Result<usize> {
        let mut entries = self.entries.lock();
        self.drain(&mut entries)
    }
}

pub struct BufferedOutput {
    name: String,
    level: LogLevel,
    enabled: AtomicBool,
    closed: AtomicBool,
    batch_size: usize,
    batch: Arc<Batch>,
    stop_tx: Mutex<Option<Sender<()>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl BufferedOutput {
    /// Wrap `inner`; a `flush_interval` of `None` disables the timer
    pub fn new(
        name: impl Into<String>,
        level: LogLevel,
        inner: Arc<dyn Output>,
        batch_size: usize,
        flush_interval: Option<Duration>,
    ) -> Result<Self> {
        let name = name.into();
        let batch_size = batch_size.max(1);
        let batch = Arc::new(Batch {
            inner,
            entries: Mutex::new(Vec::with_capacity(batch_size)),
        });

        let (stop_tx, timer) = match flush_interval.filter(|i| !i.is_zero()) {
            Some(interval) => {
                let (tx, rx) = bounded::<()>(1);
                let worker_batch = Arc::clone(&batch);
                let worker_name = name.clone();
                let handle = thread::Builder::new()
                    .name(format!("log-buffer-{}", name))
                    .spawn(move || loop {
                        match rx.recv_timeout(interval) {
                            Err(RecvTimeoutError::Timeout) => {
                                if let Err(e) = worker_batch.flush() {
                                    eprintln!(
                                        "[LOGGER ERROR] Timed flush of '{}' failed: {}",
                                        worker_name, e
                                    );
                                }
                            }
                            _ => break,
                        }
                    })
                    .map_err(|e| {
                        LoggerError::construction(name.clone(), format!("cannot spawn flush timer: {}", e))
                    })?;
                (Some(tx), Some(handle))
            }
            None => (None, None),
        };

        Ok(Self {
            name,
            level,
            enabled: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            batch_size,
            batch,
            stop_tx: Mutex::new(stop_tx),
            timer: Mutex::new(timer),
        })
    }

    /// Entries waiting for the next flush
    pub fn pending(&self) -> usize {
        self.batch.entries.lock().len()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn inner(&self) -> &Arc<dyn Output> {
        &self.batch.inner
    }

    fn stop_timer(&self) {
        if let Some(tx) = self.stop_tx.lock().take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.timer.lock().take() {
            if handle.join().is_err() {
                eprintln!("[LOGGER ERROR] Flush timer of '{}' panicked", self.name);
            }
        }
    }
}

impl Output for BufferedOutput {
    fn write(&self, entry: &LogEntry) -> Result<usize> {
        if !self.accepts(entry) {
            return Ok(0);
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(LoggerError::write(&self.name, "output is closed"));
        }

        let mut entries = self.batch.entries.lock();
        // close may have drained the batch while we waited for the lock
        if self.closed.load(Ordering::Acquire) {
            return Err(LoggerError::write(&self.name, "output is closed"));
        }
        entries.push(entry.clone());
        if entries.len() >= self.batch_size {
            return self.batch.drain(&mut entries);
        }
        Ok(0)
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
        self.batch.flush().map(|_| ())
    }

    /// Stop the timer, flush what is left, then close the wrapped output
    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.stop_timer();

        let mut errors = ErrorList::new();
        if let Err(e) = self.batch.flush() {
            errors.push(&self.name, e);
        }
        if let Err(e) = self.batch.inner.close() {
            errors.push(self.batch.inner.name(), e);
        }
        errors.into_result()
    }
}

impl Drop for BufferedOutput {
    fn drop(&mut self) {
        // dropping the sender wakes the timer thread with Disconnected
        self.stop_tx.lock().take();
    }
}

fn build(config: &OutputConfig, ctx: &OutputContext<'_>) -> Result<Box<dyn Output>> {
    let component = format!("outputs.{}", config.name);
    let settings = &config.settings;

    let inner_value = settings
        .get("output")
        .ok_or_else(|| LoggerError::config(component.clone(), "missing wrapped \"output\" setting"))?;
    let mut inner_config: OutputConfig = serde_json::from_value(inner_value.clone())
        .map_err(|e| LoggerError::config(component.clone(), format!("invalid wrapped output: {}", e)))?;
    if inner_config.name.is_empty() {
        inner_config.name = format!("{}.inner", config.name);
    }
    let inner: Arc<dyn Output> = Arc::from(ctx.build(&inner_config)?);

    let batch_size = settings
        .get_u64("batch_size")
        .map(|n| n as usize)
        .unwrap_or(DEFAULT_BATCH_SIZE);
    let flush_interval = settings
        .get_u64("flush_interval_ms")
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_FLUSH_INTERVAL);

    match BufferedOutput::new(
        config.name.clone(),
        ctx.level_for(config)?,
        Arc::clone(&inner),
        batch_size,
        Some(flush_interval),
    ) {
        Ok(output) => Ok(Box::new(output)),
        Err(e) => {
            let _ = inner.close();
            Err(e)
        }
    }
}

/// Factory registered under the `buffered` type
pub fn factory() -> OutputFactory {
    Arc::new(build)
}
