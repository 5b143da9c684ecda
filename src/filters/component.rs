//! Component filter with substring allow/deny lists

use crate::core::config::FilterConfig;
use crate::core::error::Result;
use crate::core::filter::{Filter, FilterDecision};
use crate::core::log_entry::LogEntry;
use crate::core::registry::FilterFactory;
use std::sync::Arc;

/// Drops entries whose component contains a denied pattern, or, when an
/// allow list is set, contains none of the allowed patterns
#[derive(Debug, Clone)]
pub struct ComponentFilter {
    name: String,
    allowed: Vec<String>,
    denied: Vec<String>,
}

impl ComponentFilter {
    pub fn new(name: impl Into<String>, allowed: Vec<String>, denied: Vec<String>) -> Self {
        Self {
            name: name.into(),
            allowed,
            denied,
        }
    }

    fn keeps(&self, component: &str) -> bool {
        if self.denied.iter().any(|d| component.contains(d.as_str())) {
            return false;
        }
        self.allowed.is_empty() || self.allowed.iter().any(|a| component.contains(a.as_str()))
    }
}

impl Filter for ComponentFilter {
    fn apply(&self, entry: &mut LogEntry) -> Result<FilterDecision> {
        Ok(if self.keeps(&entry.component) {
            FilterDecision::Keep
        } else {
            FilterDecision::Drop
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn build(config: &FilterConfig) -> Result<Box<dyn Filter>> {
    Ok(Box::new(ComponentFilter::new(
        config.name.clone(),
        config.settings.get_str_list("allowed"),
        config.settings.get_str_list("denied"),
    )))
}

/// Factory registered under the `component` type
pub fn factory() -> FilterFactory {
    Arc::new(build)
}
