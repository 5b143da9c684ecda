//! Filter trait and the ordered filter chain

use super::error::{ErrorList, Result};
use super::log_entry::LogEntry;
use std::sync::Arc;

/// Outcome of one filter for one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Keep,
    Drop,
}

/// A named predicate/transform applied before dispatch
///
/// A filter may rewrite the entry in place. Returning an error never drops
/// the entry: the chain treats it as `Keep` and reports the error.
pub trait Filter: Send + Sync {
    fn apply(&self, entry: &mut LogEntry) -> Result<FilterDecision>;

    fn name(&self) -> &str;
}

/// Result of running an entry through the chain
#[derive(Debug)]
pub struct ChainOutcome {
    pub decision: FilterDecision,
    /// Name of the filter that dropped the entry
    pub dropped_by: Option<String>,
    /// Evaluation errors; the entry was kept past each of them
    pub errors: ErrorList,
}

impl ChainOutcome {
    pub fn kept(&self) -> bool {
        self.decision == FilterDecision::Keep
    }
}

/// Filters in configured order; the first drop short-circuits the rest
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn Filter>>,
}

impl FilterChain {
    pub fn new(filters: Vec<Arc<dyn Filter>>) -> Self {
        Self { filters }
    }

    pub fn push(&mut self, filter: Arc<dyn Filter>) {
        self.filters.push(filter);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.filters.iter().map(|f| f.name().to_string()).collect()
    }

    pub fn apply(&self, entry: &mut LogEntry) -> ChainOutcome {
        let mut errors = ErrorList::new();

        for filter in &self.filters {
            match filter.apply(entry) {
                Ok(FilterDecision::Keep) => {}
                Ok(FilterDecision::Drop) => {
                    return ChainOutcome {
                        decision: FilterDecision::Drop,
                        dropped_by: Some(filter.name().to_string()),
                        errors,
                    };
                }
                Err(e) => errors.push(filter.name(), e),
            }
        }

        ChainOutcome {
            decision: FilterDecision::Keep,
            dropped_by: None,
            errors,
        }
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::LoggerError;
    use crate::core::LogLevel;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        name: &'static str,
        result: fn() -> Result<FilterDecision>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(name: &'static str, result: fn() -> Result<FilterDecision>) -> Arc<Self> {
            Arc::new(Self {
                name,
                result,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl Filter for Fixed {
        fn apply(&self, _entry: &mut LogEntry) -> Result<FilterDecision> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)()
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    #[test]
    fn test_drop_short_circuits() {
        let keep = Fixed::new("keep", || Ok(FilterDecision::Keep));
        let drop = Fixed::new("drop", || Ok(FilterDecision::Drop));
        let after = Fixed::new("after", || Ok(FilterDecision::Keep));
        let chain = FilterChain::new(vec![keep.clone(), drop.clone(), after.clone()]);

        let outcome = chain.apply(&mut LogEntry::new(LogLevel::Info, "m"));
        assert!(!outcome.kept());
        assert_eq!(outcome.dropped_by.as_deref(), Some("drop"));
        assert_eq!(after.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_errors_fail_open() {
        let broken = Fixed::new("broken", || Err(LoggerError::filter("broken", "bad rule")));
        let chain = FilterChain::new(vec![broken]);

        let outcome = chain.apply(&mut LogEntry::new(LogLevel::Info, "m"));
        assert!(outcome.kept());
        assert_eq!(outcome.errors.sources(), vec!["broken"]);
    }

    #[test]
    fn test_empty_chain_keeps() {
        let outcome = FilterChain::default().apply(&mut LogEntry::new(LogLevel::Trace, "m"));
        assert!(outcome.kept());
        assert!(outcome.errors.is_empty());
    }
}
