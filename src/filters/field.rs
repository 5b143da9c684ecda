//! Rule-based filter on entry fields
//!
//! Rules are evaluated in order against `level`, `message`, `component` or
//! any entry field. The first matching rule fires the filter's action:
//! `drop` discards the entry, `allow` keeps it and stops evaluating rules,
//! `modify` currently passes the entry through unchanged. An entry no rule
//! matches is kept.

use crate::core::config::{FilterConfig, FilterRule};
use crate::core::error::{LoggerError, Result};
use crate::core::filter::{Filter, FilterDecision};
use crate::core::log_entry::LogEntry;
use crate::core::registry::FilterFactory;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    StartsWith,
    EndsWith,
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equals" | "eq" | "==" => Ok(Operator::Equals),
            "not_equals" | "ne" | "!=" => Ok(Operator::NotEquals),
            "contains" => Ok(Operator::Contains),
            "starts_with" | "prefix" => Ok(Operator::StartsWith),
            "ends_with" | "suffix" => Ok(Operator::EndsWith),
            _ => Err(format!("unknown operator '{}'", s)),
        }
    }
}

impl Operator {
    fn matches(self, actual: &str, expected: &str) -> bool {
        match self {
            Operator::Equals => actual == expected,
            Operator::NotEquals => actual != expected,
            Operator::Contains => actual.contains(expected),
            Operator::StartsWith => actual.starts_with(expected),
            Operator::EndsWith => actual.ends_with(expected),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAction {
    Drop,
    Allow,
    /// Passthrough until a transformation is defined
    Modify,
}

impl FromStr for FieldAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(FieldAction::Drop),
            "allow" => Ok(FieldAction::Allow),
            "modify" => Ok(FieldAction::Modify),
            _ => Err(format!("unknown action '{}'", s)),
        }
    }
}

/// A rule with its operator parsed and its value normalised
#[derive(Debug, Clone)]
struct CompiledRule {
    field: String,
    operator: Operator,
    value: String,
    case_sensitive: bool,
}

impl CompiledRule {
    fn compile(rule: &FilterRule) -> std::result::Result<Self, String> {
        let operator = rule.operator.parse::<Operator>()?;
        let value = if rule.case_sensitive {
            rule.value.clone()
        } else {
            rule.value.to_lowercase()
        };
        Ok(Self {
            field: rule.field.clone(),
            operator,
            value,
            case_sensitive: rule.case_sensitive,
        })
    }

    fn matches(&self, entry: &LogEntry) -> bool {
        let Some(actual) = entry.field_text(&self.field) else {
            return false;
        };
        if self.case_sensitive {
            self.operator.matches(&actual, &self.value)
        } else {
            self.operator.matches(&actual.to_lowercase(), &self.value)
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldFilter {
    name: String,
    action: FieldAction,
    rules: Vec<CompiledRule>,
}

impl FieldFilter {
    /// Compile the rules; an unknown operator is a configuration error
    pub fn new(name: impl Into<String>, action: FieldAction, rules: &[FilterRule]) -> Result<Self> {
        let name = name.into();
        let rules = rules
            .iter()
            .enumerate()
            .map(|(idx, rule)| {
                CompiledRule::compile(rule).map_err(|e| {
                    LoggerError::config(format!("filters.{}.rules[{}]", name, idx), e)
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { name, action, rules })
    }

    pub fn action(&self) -> FieldAction {
        self.action
    }
}

impl Filter for FieldFilter {
    fn apply(&self, entry: &mut LogEntry) -> Result<FilterDecision> {
        for rule in &self.rules {
            if rule.matches(entry) {
                return Ok(match self.action {
                    FieldAction::Drop => FilterDecision::Drop,
                    FieldAction::Allow | FieldAction::Modify => FilterDecision::Keep,
                });
            }
        }
        Ok(FilterDecision::Keep)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn build(config: &FilterConfig) -> Result<Box<dyn Filter>> {
    let action = if config.action.trim().is_empty() {
        FieldAction::Drop
    } else {
        config
            .action
            .parse::<FieldAction>()
            .map_err(|e| LoggerError::config(format!("filters.{}", config.name), e))?
    };
    Ok(Box::new(FieldFilter::new(config.name.clone(), action, &config.rules)?))
}

/// Factory registered under the `field` type
pub fn factory() -> FilterFactory {
    Arc::new(build)
}
