//! Core pipeline types and traits

pub mod config;
pub mod error;
pub mod filter;
pub mod formatter;
pub mod hook;
pub mod log_context;
pub mod log_entry;
pub mod log_level;
pub mod logger;
pub mod manager;
pub mod metrics;
pub mod output;
pub mod registry;
pub mod timestamp;

pub use config::{ComponentConfig, FilterConfig, FilterRule, HookConfig, LogConfig, OutputConfig, Settings};
pub use error::{ErrorList, LoggerError, Result};
pub use filter::{ChainOutcome, Filter, FilterChain, FilterDecision};
pub use formatter::{Formatter, OutputFormat};
pub use hook::Hook;
pub use log_context::{FieldValue, Fields, LogContext};
pub use log_entry::{ErrorInfo, LogEntry, SourceLocation};
pub use log_level::LogLevel;
pub use logger::{ComponentState, Logger};
pub use manager::Manager;
pub use metrics::{LatencySummary, LogMetrics, MetricsSnapshot, OutputMetrics};
pub use output::{Output, OutputBase};
pub use registry::{FilterFactory, HookFactory, OutputContext, OutputFactory, Registry};
pub use timestamp::TimestampFormat;
