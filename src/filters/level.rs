//! Level filter: deny list, then allow list, then minimum level

use crate::core::config::FilterConfig;
use crate::core::error::{LoggerError, Result};
use crate::core::filter::{Filter, FilterDecision};
use crate::core::log_entry::LogEntry;
use crate::core::log_level::LogLevel;
use crate::core::registry::FilterFactory;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct LevelFilter {
    name: String,
    min_level: Option<LogLevel>,
    allow: Vec<LogLevel>,
    deny: Vec<LogLevel>,
}

impl LevelFilter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min_level: None,
            allow: Vec::new(),
            deny: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = Some(level);
        self
    }

    #[must_use]
    pub fn with_allow(mut self, levels: &[LogLevel]) -> Self {
        self.allow = levels.to_vec();
        self
    }

    #[must_use]
    pub fn with_deny(mut self, levels: &[LogLevel]) -> Self {
        self.deny = levels.to_vec();
        self
    }

    fn keeps(&self, level: LogLevel) -> bool {
        if self.deny.contains(&level) {
            return false;
        }
        if !self.allow.is_empty() && !self.allow.contains(&level) {
            return false;
        }
        self.min_level.map_or(true, |min| level >= min)
    }
}

impl Filter for LevelFilter {
    fn apply(&self, entry: &mut LogEntry) -> Result<FilterDecision> {
        Ok(if self.keeps(entry.level) {
            FilterDecision::Keep
        } else {
            FilterDecision::Drop
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn parse_levels(config: &FilterConfig, key: &str) -> Result<Vec<LogLevel>> {
    config
        .settings
        .get_str_list(key)
        .iter()
        .map(|l| {
            l.parse::<LogLevel>()
                .map_err(|e| LoggerError::config(format!("filters.{}.{}", config.name, key), e))
        })
        .collect()
}

fn build(config: &FilterConfig) -> Result<Box<dyn Filter>> {
    let mut filter = LevelFilter::new(config.name.clone())
        .with_allow(&parse_levels(config, "allow")?)
        .with_deny(&parse_levels(config, "deny")?);

    if let Some(min) = config.settings.get_str("min_level").filter(|s| !s.is_empty()) {
        let level = min
            .parse::<LogLevel>()
            .map_err(|e| LoggerError::config(format!("filters.{}.min_level", config.name), e))?;
        filter = filter.with_min_level(level);
    }
    Ok(Box::new(filter))
}

/// Factory registered under the `level` type
pub fn factory() -> FilterFactory {
    Arc::new(build)
}
