//! # Rust Log Pipeline
//!
//! A structured logging pipeline: named loggers feed entries through a
//! filter chain and a set of hooks into any number of outputs.
//!
//! ## Features
//!
//! - **Declarative**: the whole pipeline is described by a [`LogConfig`]
//!   that round-trips through JSON and TOML
//! - **Pluggable**: outputs, filters and hooks are built by named factories
//!   and user factories take precedence over the built-in ones
//! - **Isolated failures**: a failing or panicking output never blocks its
//!   siblings, and every failure is kept
//! - **Observable**: per-level and per-output metrics with latency summaries
//!
//! ## Quick start
//!
//! ```
//! use rust_log_pipeline::prelude::*;
//!
//! let manager = Manager::new(LogConfig::empty().with_level("debug"));
//! manager.start().unwrap();
//!
//! let logger = manager.get_logger("worker").with_field("queue", "emails");
//! logger.debug("polling");
//! rust_log_pipeline::info!(logger, "sent {} messages", 3);
//!
//! manager.stop().unwrap();
//! ```

pub mod core;
pub mod filters;
pub mod hooks;
pub mod macros;
pub mod outputs;

pub mod prelude {
    pub use crate::core::{
        ComponentConfig, FieldValue, Fields, Filter, FilterConfig, FilterDecision, FilterRule, Hook,
        HookConfig, LogConfig, LogContext, LogEntry, LogLevel, Logger, LoggerError, Manager,
        MetricsSnapshot, Output, OutputConfig, Result,
    };
}

pub use crate::core::{
    ChainOutcome, ComponentConfig, ComponentState, ErrorInfo, ErrorList, FieldValue, Fields, Filter,
    FilterChain, FilterConfig, FilterDecision, FilterFactory, FilterRule, Formatter, Hook, HookConfig,
    HookFactory, LatencySummary, LogConfig, LogContext, LogEntry, LogLevel, LogMetrics, Logger,
    LoggerError, Manager, MetricsSnapshot, Output, OutputBase, OutputConfig, OutputContext,
    OutputFactory, OutputFormat, OutputMetrics, Registry, Result, Settings, SourceLocation,
    TimestampFormat,
};
