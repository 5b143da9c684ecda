//! Per-component logging facade

use super::log_context::{FieldValue, Fields, LogContext};
use super::log_entry::{ErrorInfo, LogEntry};
use super::log_level::LogLevel;
use super::manager::Shared;
use crate::filters::sampling::sample;
use parking_lot::RwLock;
use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

/// Adjustable state of one component
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentState {
    pub level: LogLevel,
    pub enabled: bool,
    pub sample_rate: f64,
}

impl Default for ComponentState {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            enabled: true,
            sample_rate: 1.0,
        }
    }
}

/// A named entry point into a pipeline
///
/// Loggers are cheap to clone. The `with_*` methods return a derived logger
/// carrying extra context; a derived logger starts from a copy of its
/// parent's level and never affects the parent afterwards. Logging calls
/// never fail: dispatch errors are recorded in the metrics and reported on
/// stderr.
///
/// # Examples
///
/// ```
/// use rust_log_pipeline::{LogConfig, LogLevel, Manager};
///
/// let manager = Manager::new(LogConfig::empty());
/// manager.start().unwrap();
///
/// let logger = manager.get_logger("payments").with_field("region", "eu-west");
/// logger.warn("retrying charge");
/// logger.set_level(LogLevel::Error);
/// logger.warn("suppressed");
///
/// assert_eq!(manager.get_metrics().entries_total, 1);
/// ```
#[derive(Clone)]
pub struct Logger {
    shared: Arc<Shared>,
    name: String,
    control: Arc<RwLock<ComponentState>>,
    component: String,
    fields: Fields,
    request_id: Option<String>,
    user_id: Option<String>,
    trace_id: Option<String>,
    span_id: Option<String>,
}

impl Logger {
    pub(crate) fn new(
        shared: Arc<Shared>,
        name: &str,
        control: Arc<RwLock<ComponentState>>,
        fields: Fields,
    ) -> Self {
        Self {
            shared,
            name: name.to_string(),
            control,
            component: name.to_string(),
            fields,
            request_id: None,
            user_id: None,
            trace_id: None,
            span_id: None,
        }
    }

    /// Copy of this logger with its own level state
    fn derive(&self) -> Self {
        let state = *self.control.read();
        Self {
            control: Arc::new(RwLock::new(state)),
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn level(&self) -> LogLevel {
        self.control.read().level
    }

    pub fn set_level(&self, level: LogLevel) {
        self.control.write().level = level;
    }

    pub fn is_enabled(&self) -> bool {
        self.control.read().enabled
    }

    /// Whether an entry at `level` would currently reach dispatch, ignoring sampling
    pub fn is_level_enabled(&self, level: LogLevel) -> bool {
        let state = self.control.read();
        state.enabled && level >= state.level
    }

    #[must_use]
    pub fn with_component(&self, component: impl Into<String>) -> Self {
        let mut logger = self.derive();
        logger.component = component.into();
        logger
    }

    #[must_use]
    pub fn with_field(&self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        let mut logger = self.derive();
        logger.fields.insert(key.into(), value.into());
        logger
    }

    #[must_use]
    pub fn with_fields(&self, fields: Fields) -> Self {
        let mut logger = self.derive();
        logger.fields.extend(fields);
        logger
    }

    #[must_use]
    pub fn with_request_id(&self, id: impl Into<String>) -> Self {
        let mut logger = self.derive();
        logger.request_id = Some(id.into());
        logger
    }

    #[must_use]
    pub fn with_user_id(&self, id: impl Into<String>) -> Self {
        let mut logger = self.derive();
        logger.user_id = Some(id.into());
        logger
    }

    #[must_use]
    pub fn with_trace(&self, trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        let mut logger = self.derive();
        logger.trace_id = Some(trace_id.into());
        logger.span_id = Some(span_id.into());
        logger
    }

    /// Derived logger carrying the identifiers set in `ctx`
    #[must_use]
    pub fn with_context(&self, ctx: &LogContext) -> Self {
        let mut logger = self.derive();
        if let Some(component) = &ctx.component {
            logger.component = component.clone();
        }
        if ctx.request_id.is_some() {
            logger.request_id = ctx.request_id.clone();
        }
        if ctx.user_id.is_some() {
            logger.user_id = ctx.user_id.clone();
        }
        if ctx.trace_id.is_some() {
            logger.trace_id = ctx.trace_id.clone();
        }
        if ctx.span_id.is_some() {
            logger.span_id = ctx.span_id.clone();
        }
        logger
    }

    /// Level, enabled and sampling gate; sampled-out entries count as dropped
    fn admit(&self, level: LogLevel) -> bool {
        let state = *self.control.read();
        if !state.enabled || level < state.level {
            return false;
        }
        if !sample(state.sample_rate) {
            let metrics = self.shared.metrics();
            metrics.record_entry(level);
            metrics.record_dropped();
            return false;
        }
        true
    }

    fn build(
        &self,
        level: LogLevel,
        message: String,
        fields: Fields,
        location: &'static Location<'static>,
        function: Option<&str>,
    ) -> LogEntry {
        let mut merged = self.fields.clone();
        merged.extend(fields);

        let mut entry = LogEntry::new(level, message)
            .with_component(self.component.clone())
            .with_fields(merged);
        entry.request_id = self.request_id.clone();
        entry.user_id = self.user_id.clone();
        entry.trace_id = self.trace_id.clone();
        entry.span_id = self.span_id.clone();

        if self.shared.caller_enabled() {
            entry = entry.with_location(location.file(), location.line(), function);
        }
        entry
    }

    fn send(&self, entry: LogEntry) {
        let level = entry.level;
        if let Err(e) = self.shared.dispatch(entry) {
            eprintln!("[LOGGER ERROR] Logger '{}' dispatch failed: {}", self.name, e);
        }
        if level >= LogLevel::Fatal {
            if let Err(e) = self.shared.flush() {
                eprintln!("[LOGGER ERROR] Flush after {} entry failed: {}", level, e);
            }
        }
    }

    fn emit(
        &self,
        level: LogLevel,
        message: String,
        fields: Fields,
        location: &'static Location<'static>,
        decorate: impl FnOnce(LogEntry) -> LogEntry,
    ) {
        if !self.admit(level) {
            return;
        }
        let entry = self.build(level, message, fields, location, None);
        self.send(decorate(entry));
    }

    #[track_caller]
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(level, message.into(), Fields::new(), Location::caller(), |e| e);
    }

    /// Log with call-site fields; they win over the logger's own fields
    #[track_caller]
    pub fn log_with_fields(&self, level: LogLevel, message: impl Into<String>, fields: Fields) {
        self.emit(level, message.into(), fields, Location::caller(), |e| e);
    }

    #[track_caller]
    pub fn trace(&self, message: impl Into<String>) {
        self.log(LogLevel::Trace, message);
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    #[track_caller]
    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Dispatch and flush the pipeline; the process keeps running
    #[track_caller]
    pub fn fatal(&self, message: impl Into<String>) {
        self.log(LogLevel::Fatal, message);
    }

    /// Dispatch and flush the pipeline; the caller decides whether to unwind
    #[track_caller]
    pub fn panic(&self, message: impl Into<String>) {
        self.log(LogLevel::Panic, message);
    }

    #[track_caller]
    pub fn log_ctx(&self, level: LogLevel, ctx: &LogContext, message: impl Into<String>) {
        let location = Location::caller();
        self.with_context(ctx)
            .emit(level, message.into(), Fields::new(), location, |e| e);
    }

    #[track_caller]
    pub fn trace_ctx(&self, ctx: &LogContext, message: impl Into<String>) {
        self.log_ctx(LogLevel::Trace, ctx, message);
    }

    #[track_caller]
    pub fn debug_ctx(&self, ctx: &LogContext, message: impl Into<String>) {
        self.log_ctx(LogLevel::Debug, ctx, message);
    }

    #[track_caller]
    pub fn info_ctx(&self, ctx: &LogContext, message: impl Into<String>) {
        self.log_ctx(LogLevel::Info, ctx, message);
    }

    #[track_caller]
    pub fn warn_ctx(&self, ctx: &LogContext, message: impl Into<String>) {
        self.log_ctx(LogLevel::Warn, ctx, message);
    }

    #[track_caller]
    pub fn error_ctx(&self, ctx: &LogContext, message: impl Into<String>) {
        self.log_ctx(LogLevel::Error, ctx, message);
    }

    #[track_caller]
    pub fn fatal_ctx(&self, ctx: &LogContext, message: impl Into<String>) {
        self.log_ctx(LogLevel::Fatal, ctx, message);
    }

    #[track_caller]
    pub fn panic_ctx(&self, ctx: &LogContext, message: impl Into<String>) {
        self.log_ctx(LogLevel::Panic, ctx, message);
    }

    /// Log at error level with the error and its `source()` chain attached
    #[track_caller]
    pub fn log_error(&self, message: impl Into<String>, err: &(dyn std::error::Error + 'static)) {
        let info = ErrorInfo::from_error(err);
        self.emit(LogLevel::Error, message.into(), Fields::new(), Location::caller(), |e| {
            e.with_error(info)
        });
    }

    /// Log with an elapsed duration attached
    #[track_caller]
    pub fn log_duration(&self, level: LogLevel, message: impl Into<String>, duration: Duration) {
        self.emit(level, message.into(), Fields::new(), Location::caller(), |e| {
            e.with_duration(duration)
        });
    }

    #[doc(hidden)]
    #[track_caller]
    pub fn log_from_macro(&self, level: LogLevel, module: &'static str, message: String, fields: Fields) {
        if !self.admit(level) {
            return;
        }
        let entry = self.build(level, message, fields, Location::caller(), Some(module));
        self.send(entry);
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("component", &self.component)
            .field("state", &*self.control.read())
            .field("fields", &self.fields)
            .finish()
    }
}
