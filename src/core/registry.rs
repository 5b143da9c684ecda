//! Factory registries keyed by configuration `type` strings

use super::config::{FilterConfig, HookConfig, LogConfig, OutputConfig};
use super::error::{LoggerError, Result};
use super::filter::Filter;
use super::formatter::Formatter;
use super::hook::Hook;
use super::log_level::LogLevel;
use super::output::Output;
use super::timestamp::TimestampFormat;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds an output from its configuration
pub type OutputFactory =
    Arc<dyn Fn(&OutputConfig, &OutputContext<'_>) -> Result<Box<dyn Output>> + Send + Sync>;

/// Builds a filter from its configuration
pub type FilterFactory = Arc<dyn Fn(&FilterConfig) -> Result<Box<dyn Filter>> + Send + Sync>;

/// Builds a hook from its configuration
pub type HookFactory = Arc<dyn Fn(&HookConfig) -> Result<Box<dyn Hook>> + Send + Sync>;

/// Map from a type string to a constructor
#[derive(Clone)]
pub struct Registry<F> {
    kind: &'static str,
    entries: HashMap<String, F>,
}

impl<F: Clone> Registry<F> {
    /// `kind` names the registry in error messages ("output", "filter", ...)
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    /// Register a factory, replacing any previous one under the same type
    pub fn register(&mut self, type_name: impl Into<String>, factory: F) {
        self.entries.insert(type_name.into(), factory);
    }

    /// Register a factory only when the type is still free
    pub fn register_default(&mut self, type_name: &str, factory: F) -> bool {
        if self.entries.contains_key(type_name) {
            return false;
        }
        self.entries.insert(type_name.to_string(), factory);
        true
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.entries.contains_key(type_name)
    }

    pub fn get(&self, type_name: &str) -> Result<F> {
        self.entries.get(type_name).cloned().ok_or_else(|| {
            LoggerError::config(
                format!("{} factory", self.kind),
                format!("no factory registered for type '{}'", type_name),
            )
        })
    }

    /// Registered type names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }
}

impl<F> std::fmt::Debug for Registry<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.entries.keys().collect();
        names.sort();
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("types", &names)
            .finish()
    }
}

/// What an output factory sees besides its own configuration
///
/// Wrapping outputs (buffered, multi) build their members through
/// [`OutputContext::build`], so nested outputs resolve against the same
/// registry and global defaults.
pub struct OutputContext<'a> {
    pub config: &'a LogConfig,
    pub factories: &'a Registry<OutputFactory>,
}

impl<'a> OutputContext<'a> {
    pub fn new(config: &'a LogConfig, factories: &'a Registry<OutputFactory>) -> Self {
        Self { config, factories }
    }

    /// Construct an output through its registered factory
    pub fn build(&self, output: &OutputConfig) -> Result<Box<dyn Output>> {
        if output.kind.trim().is_empty() {
            return Err(LoggerError::config(
                format!("outputs.{}", output.name),
                "missing \"type\" field",
            ));
        }
        let factory = self.factories.get(&output.kind)?;
        let built = factory(output, self)?;
        if !output.enabled {
            built.set_enabled(false);
        }
        Ok(built)
    }

    /// Minimum level of an output, inheriting the global level
    pub fn level_for(&self, output: &OutputConfig) -> Result<LogLevel> {
        self.config
            .resolve_level(&output.level, &format!("outputs.{}", output.name))
    }

    /// Formatter of an output, honouring the global display settings
    pub fn formatter_for(&self, output: &OutputConfig) -> Result<Formatter> {
        let format = self
            .config
            .resolve_format(&output.format, &format!("outputs.{}", output.name))?;
        let colors = output
            .settings
            .get_bool("color")
            .unwrap_or(self.config.color);

        Ok(Formatter::new(format)
            .with_colors(colors)
            .with_caller(self.config.caller)
            .with_time(self.config.timestamp)
            .with_timestamp_format(TimestampFormat::from_config(&self.config.time_format))
            .with_component_field(self.config.component_field.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unregistered_type_is_configuration_error() {
        let registry: Registry<FilterFactory> = Registry::new("filter");
        let err = registry.get("nope").err().unwrap();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_register_default_keeps_user_registration() {
        let mut registry: Registry<Arc<u8>> = Registry::new("test");
        registry.register("console", Arc::new(1));
        assert!(!registry.register_default("console", Arc::new(2)));
        assert!(registry.register_default("file", Arc::new(3)));

        assert_eq!(*registry.get("console").unwrap(), 1);
        assert_eq!(registry.names(), vec!["console", "file"]);
    }

    #[test]
    fn test_formatter_inherits_global_format() {
        let config = LogConfig::empty().with_format("json");
        let registry = Registry::new("output");
        let ctx = OutputContext::new(&config, &registry);

        let formatter = ctx
            .formatter_for(&OutputConfig::new("a", "console"))
            .unwrap();
        assert_eq!(formatter.output_format(), crate::core::OutputFormat::Json);

        let formatter = ctx
            .formatter_for(&OutputConfig::new("b", "console").with_format("console"))
            .unwrap();
        assert_eq!(formatter.output_format(), crate::core::OutputFormat::Console);
    }
}
