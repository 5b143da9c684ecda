//! Logging macros for ergonomic log message formatting.
//!
//! These macros provide a convenient interface for logging with automatic
//! string formatting, similar to `println!` and `format!`. An optional
//! `key => value` list before a `;` attaches call-site fields. Entries
//! logged through a macro record the calling module path as their function
//! when caller reporting is enabled.
//!
//! # Examples
//!
//! ```
//! use rust_log_pipeline::prelude::*;
//! use rust_log_pipeline::{info, warn};
//!
//! let manager = Manager::new(LogConfig::empty());
//! manager.start().unwrap();
//! let logger = manager.get_logger("server");
//!
//! // Basic logging
//! info!(logger, "Server started");
//!
//! // With format arguments
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//!
//! // With fields
//! warn!(logger, "port" => port, "tls" => false; "Plaintext listener on {}", port);
//! ```

/// Log a message with automatic formatting.
///
/// # Examples
///
/// ```
/// # use rust_log_pipeline::prelude::*;
/// # let manager = Manager::new(LogConfig::empty());
/// # let logger = manager.get_logger("docs");
/// use rust_log_pipeline::log;
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Error, "Error code: {}", 500);
/// log!(logger, LogLevel::Error, "code" => 500; "Request failed");
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($key:literal => $value:expr),+ ; $($arg:tt)+) => {{
        let mut fields = $crate::Fields::new();
        $(
            fields.insert(($key).to_string(), $crate::FieldValue::from($value));
        )+
        $logger.log_from_macro($level, module_path!(), format!($($arg)+), fields)
    }};
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log_from_macro($level, module_path!(), format!($($arg)+), $crate::Fields::new())
    };
}

/// Log a trace-level message.
///
/// # Examples
///
/// ```
/// # use rust_log_pipeline::prelude::*;
/// # let manager = Manager::new(LogConfig::empty().with_level("trace"));
/// # let logger = manager.get_logger("docs");
/// use rust_log_pipeline::trace;
/// trace!(logger, "Entering function: calculate()");
/// trace!(logger, "Variable value: {}", 42);
/// ```
#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Trace, $($arg)+)
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log an info-level message.
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warn, $($arg)+)
    };
}

/// Log an error-level message.
///
/// # Examples
///
/// ```
/// # use rust_log_pipeline::prelude::*;
/// # let manager = Manager::new(LogConfig::empty());
/// # let logger = manager.get_logger("docs");
/// use rust_log_pipeline::error;
/// error!(logger, "Failed to connect to database");
/// error!(logger, "db" => "orders", "attempt" => 3; "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a fatal-level message and flush the pipeline.
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Fatal, $($arg)+)
    };
}

/// Log a panic-level message and flush the pipeline; does not unwind.
#[macro_export]
macro_rules! panic_log {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Panic, $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use crate::core::{FieldValue, LogConfig, LogLevel, Manager};
    use crate::outputs::testing::RecordingOutput;

    fn pipeline(level: &str) -> (Manager, std::sync::Arc<RecordingOutput>) {
        let mut config = LogConfig::empty().with_level(level);
        config.caller = true;
        let manager = Manager::new(config);
        manager.start().unwrap();
        let sink = RecordingOutput::new("sink");
        manager.add_output(sink.clone());
        (manager, sink)
    }

    #[test]
    fn test_log_macro() {
        let (manager, sink) = pipeline("info");
        let logger = manager.get_logger("m");
        log!(logger, LogLevel::Info, "Test message");
        log!(logger, LogLevel::Info, "Formatted: {}", 42);

        assert_eq!(sink.messages(), vec!["Test message", "Formatted: 42"]);
    }

    #[test]
    fn test_leveled_macros() {
        let (manager, sink) = pipeline("trace");
        let logger = manager.get_logger("m");
        trace!(logger, "t");
        debug!(logger, "Count: {}", 5);
        info!(logger, "i");
        warn!(logger, "Retry {} of {}", 1, 3);
        error!(logger, "e");
        fatal!(logger, "f");
        panic_log!(logger, "p");

        let levels: Vec<LogLevel> = sink.entries().iter().map(|e| e.level).collect();
        assert_eq!(levels, LogLevel::ALL.to_vec());
    }

    #[test]
    fn test_fields_and_module_path() {
        let (manager, sink) = pipeline("info");
        let logger = manager.get_logger("m").with_field("attempt", 1);
        info!(logger, "attempt" => 2, "peer" => "10.0.0.7"; "connected to {}", "db");

        let entry = &sink.entries()[0];
        assert_eq!(entry.message, "connected to db");
        assert_eq!(entry.fields["attempt"], FieldValue::from(2));
        assert_eq!(entry.fields["peer"], FieldValue::from("10.0.0.7"));
        assert_eq!(
            entry.source.as_ref().and_then(|s| s.function.as_deref()),
            Some(module_path!())
        );
    }

    #[test]
    fn test_below_level_is_skipped() {
        let (manager, sink) = pipeline("warn");
        let logger = manager.get_logger("m");
        debug!(logger, "hidden {}", 1);
        assert_eq!(sink.writes(), 0);
    }
}
