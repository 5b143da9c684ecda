//! Declarative pipeline configuration
//!
//! A [`LogConfig`] describes one pipeline instance: global defaults, the
//! outputs to build, per-component overrides, hooks and the filter chain.
//! It round-trips losslessly through JSON and TOML documents.

use super::error::{LoggerError, Result};
use super::formatter::OutputFormat;
use super::log_level::LogLevel;
use super::timestamp::TimestampFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Free-form settings map carried by outputs, hooks and filters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(BTreeMap<String, serde_json::Value>);

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(|v| v.as_u64())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(|v| v.as_bool())
    }

    /// A list of strings; a single string is accepted as a one-element list
    pub fn get_str_list(&self, key: &str) -> Vec<String> {
        match self.0.get(key) {
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(serde_json::Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn default_true() -> bool {
    true
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_component_field() -> String {
    "component".to_string()
}

fn default_sample_rate() -> f64 {
    1.0
}

/// Configuration of one output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Minimum level; empty inherits the global level
    #[serde(default)]
    pub level: String,
    /// Format name; empty inherits the global format
    #[serde(default)]
    pub format: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Settings::is_empty")]
    pub settings: Settings,
}

impl OutputConfig {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            level: String::new(),
            format: String::new(),
            enabled: true,
            settings: Settings::new(),
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.settings.insert(key, value);
        self
    }
}

/// Per-component override
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfig {
    /// Minimum level; empty inherits the global level
    #[serde(default)]
    pub level: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<f64>,
    /// Fixed fields attached to every entry of the component
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl Default for ComponentConfig {
    fn default() -> Self {
        Self {
            level: String::new(),
            enabled: true,
            sample_rate: None,
            fields: BTreeMap::new(),
        }
    }
}

impl ComponentConfig {
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    #[must_use]
    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// Configuration of one hook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookConfig {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Levels the hook fires for; empty means every level
    #[serde(default)]
    pub levels: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Settings::is_empty")]
    pub settings: Settings,
}

impl HookConfig {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            levels: Vec::new(),
            enabled: true,
            settings: Settings::new(),
        }
    }

    #[must_use]
    pub fn with_levels(mut self, levels: &[&str]) -> Self {
        self.levels = levels.iter().map(|l| l.to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.settings.insert(key, value);
        self
    }

    /// Parsed levels
    pub fn parsed_levels(&self) -> Result<Vec<LogLevel>> {
        self.levels
            .iter()
            .map(|l| {
                l.parse::<LogLevel>()
                    .map_err(|e| LoggerError::config(format!("hooks.{}", self.name), e))
            })
            .collect()
    }
}

/// One rule of a field filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRule {
    pub field: String,
    pub operator: String,
    pub value: String,
    #[serde(default = "default_true")]
    pub case_sensitive: bool,
}

impl FilterRule {
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
            case_sensitive: true,
        }
    }

    #[must_use]
    pub fn case_insensitive(mut self) -> Self {
        self.case_sensitive = false;
        self
    }
}

/// Configuration of one filter in the chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub action: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<FilterRule>,
    #[serde(default, skip_serializing_if = "Settings::is_empty")]
    pub settings: Settings,
}

impl FilterConfig {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            action: String::new(),
            enabled: true,
            rules: Vec::new(),
            settings: Settings::new(),
        }
    }

    #[must_use]
    pub fn with_rule(mut self, rule: FilterRule) -> Self {
        self.rules.push(rule);
        self
    }

    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    #[must_use]
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.settings.insert(key, value);
        self
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_true")]
    pub color: bool,
    #[serde(default)]
    pub caller: bool,
    /// Whether text outputs print the timestamp
    #[serde(default = "default_true")]
    pub timestamp: bool,
    #[serde(default)]
    pub time_format: String,
    #[serde(default = "default_component_field")]
    pub component_field: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,
    #[serde(default)]
    pub outputs: BTreeMap<String, OutputConfig>,
    #[serde(default)]
    pub components: BTreeMap<String, ComponentConfig>,
    #[serde(default)]
    pub hooks: Vec<HookConfig>,
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
}

impl Default for LogConfig {
    /// Info level, text format and a single console output
    fn default() -> Self {
        let mut outputs = BTreeMap::new();
        outputs.insert("console".to_string(), OutputConfig::new("console", "console"));

        Self {
            level: default_level(),
            format: default_format(),
            color: true,
            caller: false,
            timestamp: true,
            time_format: String::new(),
            component_field: default_component_field(),
            sample_rate: default_sample_rate(),
            outputs,
            components: BTreeMap::new(),
            hooks: Vec::new(),
            filters: Vec::new(),
        }
    }
}

impl LogConfig {
    /// A configuration with no outputs, hooks or filters
    pub fn empty() -> Self {
        Self {
            outputs: BTreeMap::new(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Add an output under its own name
    #[must_use]
    pub fn with_output(mut self, output: OutputConfig) -> Self {
        self.outputs.insert(output.name.clone(), output);
        self
    }

    #[must_use]
    pub fn with_component(mut self, name: impl Into<String>, component: ComponentConfig) -> Self {
        self.components.insert(name.into(), component);
        self
    }

    #[must_use]
    pub fn with_hook(mut self, hook: HookConfig) -> Self {
        self.hooks.push(hook);
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filters.push(filter);
        self
    }

    /// Global minimum level
    pub fn parsed_level(&self) -> Result<LogLevel> {
        self.level
            .parse()
            .map_err(|e: String| LoggerError::config("level", e))
    }

    /// Global output format
    pub fn parsed_format(&self) -> Result<OutputFormat> {
        self.format
            .parse()
            .map_err(|e: String| LoggerError::config("format", e))
    }

    /// Resolve a possibly-empty level against the global level
    pub fn resolve_level(&self, level: &str, component: &str) -> Result<LogLevel> {
        if level.trim().is_empty() {
            self.parsed_level()
        } else {
            level.parse().map_err(|e: String| LoggerError::config(component, e))
        }
    }

    /// Resolve a possibly-empty format against the global format
    pub fn resolve_format(&self, format: &str, component: &str) -> Result<OutputFormat> {
        if format.trim().is_empty() {
            self.parsed_format()
        } else {
            format.parse().map_err(|e: String| LoggerError::config(component, e))
        }
    }

    /// Name every output after its map key
    ///
    /// The key is authoritative: a `name` inside the entry that disagrees
    /// with it is overwritten, so outputs and metrics are addressed by key.
    pub fn normalize(&mut self) {
        for (key, output) in self.outputs.iter_mut() {
            if output.name != *key {
                output.name = key.clone();
            }
        }
    }

    /// Check the document for the first violation
    ///
    /// Factory registration is checked later, when the manager applies the
    /// configuration.
    pub fn validate(&self) -> Result<()> {
        self.parsed_level()?;
        self.parsed_format()?;
        TimestampFormat::validate_config(&self.time_format)
            .map_err(|e| LoggerError::config("time_format", e))?;
        check_rate("sample_rate", self.sample_rate)?;

        for (key, output) in &self.outputs {
            let component = format!("outputs.{}", key);
            if output.kind.trim().is_empty() {
                return Err(LoggerError::config(component, "missing \"type\" field"));
            }
            self.resolve_level(&output.level, &component)?;
            self.resolve_format(&output.format, &component)?;
        }

        for (key, component) in &self.components {
            let name = format!("components.{}", key);
            self.resolve_level(&component.level, &name)?;
            if let Some(rate) = component.sample_rate {
                check_rate(&name, rate)?;
            }
        }

        for hook in &self.hooks {
            if hook.kind.trim().is_empty() {
                return Err(LoggerError::config(
                    format!("hooks.{}", hook.name),
                    "missing \"type\" field",
                ));
            }
            hook.parsed_levels()?;
        }

        for filter in &self.filters {
            if filter.kind.trim().is_empty() {
                return Err(LoggerError::config(
                    format!("filters.{}", filter.name),
                    "missing \"type\" field",
                ));
            }
        }

        Ok(())
    }

    /// Parse a JSON document
    pub fn from_json(text: &str) -> Result<Self> {
        let mut config: LogConfig = serde_json::from_str(text)?;
        config.normalize();
        Ok(config)
    }

    /// Parse a TOML document
    pub fn from_toml(text: &str) -> Result<Self> {
        let mut config: LogConfig = toml::from_str(text)?;
        config.normalize();
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    /// Load from a file; `.toml` files are read as TOML, anything else as JSON
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            LoggerError::io_operation(
                "loading log configuration",
                format!("cannot read '{}'", path.display()),
                e,
            )
        })?;
        if is_toml(path) {
            Self::from_toml(&text)
        } else {
            Self::from_json(&text)
        }
    }

    /// Save to a file, choosing the codec like [`LogConfig::from_file`]
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = if is_toml(path) { self.to_toml()? } else { self.to_json()? };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, text).map_err(|e| {
            LoggerError::io_operation(
                "saving log configuration",
                format!("cannot write '{}'", path.display()),
                e,
            )
        })
    }
}

fn check_rate(component: &str, rate: f64) -> Result<()> {
    if (0.0..=1.0).contains(&rate) {
        Ok(())
    } else {
        Err(LoggerError::config(
            component,
            format!("sample rate {} outside [0, 1]", rate),
        ))
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"))
}
