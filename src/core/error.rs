//! Error types for the logging pipeline

use std::fmt;

pub type Result<T> = std::result::Result<T, LoggerError>;

/// A list of failures, each tagged with the component that produced it
///
/// Used wherever several independent operations are attempted and every
/// failure must be reported (fan-out writes, flush, shutdown).
#[derive(Debug, Default)]
pub struct ErrorList(Vec<(String, LoggerError)>);

impl ErrorList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, source: impl Into<String>, error: LoggerError) {
        self.0.push((source.into(), error));
    }

    /// Move every failure of `other` to the end of this list
    pub fn append(&mut self, mut other: ErrorList) {
        self.0.append(&mut other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LoggerError)> {
        self.0.iter().map(|(name, err)| (name.as_str(), err))
    }

    /// Names of the failing components, in failure order
    pub fn sources(&self) -> Vec<&str> {
        self.0.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Convert into `Ok(())` when empty, otherwise an `Aggregate` error
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(LoggerError::Aggregate(self))
        }
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (name, err)) in self.0.iter().enumerate() {
            if idx > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", name, err)?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// Invalid or missing configuration, or an unregistered factory type
    #[error("Invalid configuration for {component}: {message}")]
    Configuration { component: String, message: String },

    /// A sink, filter or hook failed to acquire its resource
    #[error("Failed to construct '{name}': {message}")]
    Construction { name: String, message: String },

    /// A sink failed while writing an entry
    #[error("Write to output '{output}' failed: {message}")]
    Write { output: String, message: String },

    /// A filter failed while evaluating an entry
    #[error("Filter '{filter}' failed: {message}")]
    Filter { filter: String, message: String },

    /// A hook failed while handling an entry
    #[error("Hook '{hook}' failed: {message}")]
    Hook { hook: String, message: String },

    /// Flush or close failures collected during shutdown
    #[error("Shutdown completed with {} failure(s): {failures}", failures.len())]
    Shutdown { failures: ErrorList },

    /// Several independent failures
    #[error("{} operation(s) failed: {}", .0.len(), .0)]
    Aggregate(ErrorList),

    /// Manager was started twice
    #[error("Log manager already started")]
    AlreadyStarted,

    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML encode error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("TOML decode error: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// Create a configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::Configuration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a construction error
    pub fn construction(name: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::Construction {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a write error
    pub fn write(output: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::Write {
            output: output.into(),
            message: message.into(),
        }
    }

    /// Create a filter evaluation error
    pub fn filter(filter: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::Filter {
            filter: filter.into(),
            message: message.into(),
        }
    }

    /// Create a hook error
    pub fn hook(hook: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::Hook {
            hook: hook.into(),
            message: message.into(),
        }
    }

    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, LoggerError::Configuration { .. })
    }
}
