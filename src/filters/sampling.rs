//! Probabilistic and count-bounded sampling
//!
//! Without a key field every entry survives with probability `sample_rate`.
//! With a key field, survivors are counted per key value and once a key
//! reaches `max_samples` every further entry for it is dropped outright.

use crate::core::config::FilterConfig;
use crate::core::error::{LoggerError, Result};
use crate::core::filter::{Filter, FilterDecision};
use crate::core::log_entry::LogEntry;
use crate::core::registry::FilterFactory;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Uniform draw: `true` with probability `rate`
pub fn sample(rate: f64) -> bool {
    if rate >= 1.0 {
        return true;
    }
    if rate <= 0.0 {
        return false;
    }
    rand::thread_rng().gen::<f64>() < rate
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplingSettings {
    pub sample_rate: f64,
    /// Field whose value partitions the per-key counters
    pub key_field: Option<String>,
    /// Survivors allowed per key; 0 means unbounded
    pub max_samples: u64,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            sample_rate: 1.0,
            key_field: None,
            max_samples: 0,
        }
    }
}

impl SamplingSettings {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    /// Count survivors per value of `field`, keeping at most `max_samples`
    /// for each
    ///
    /// One counter is held for every distinct value seen and counters are
    /// never evicted, so memory grows with the cardinality of the field.
    /// Key on bounded values (user, endpoint, error code) rather than on
    /// request ids or timestamps. With `max_samples` 0 no counters are kept.
    #[must_use]
    pub fn with_key(mut self, field: impl Into<String>, max_samples: u64) -> Self {
        self.key_field = Some(field.into());
        self.max_samples = max_samples;
        self
    }
}

pub struct SamplingFilter {
    name: String,
    settings: SamplingSettings,
    counters: Mutex<HashMap<String, u64>>,
    sampled: AtomicU64,
    dropped: AtomicU64,
}

impl SamplingFilter {
    pub fn new(name: impl Into<String>, settings: SamplingSettings) -> Result<Self> {
        let name = name.into();
        if !(0.0..=1.0).contains(&settings.sample_rate) {
            return Err(LoggerError::config(
                format!("filters.{}", name),
                format!("sample_rate {} is outside [0, 1]", settings.sample_rate),
            ));
        }
        Ok(Self {
            name,
            settings,
            counters: Mutex::new(HashMap::new()),
            sampled: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        })
    }

    pub fn sampled_count(&self) -> u64 {
        self.sampled.load(Ordering::Relaxed)
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Survivors counted so far for one key value
    pub fn key_count(&self, key: &str) -> u64 {
        self.counters.lock().get(key).copied().unwrap_or(0)
    }

    /// Number of distinct key values holding a counter
    pub fn tracked_keys(&self) -> usize {
        self.counters.lock().len()
    }

    fn decide(&self, entry: &LogEntry) -> bool {
        let field = match self.settings.key_field {
            Some(ref field) if self.settings.max_samples > 0 => field,
            _ => return sample(self.settings.sample_rate),
        };

        // entries without the key share one bucket
        let key = entry.field_text(field).unwrap_or_default();
        let mut counters = self.counters.lock();
        let count = counters.entry(key).or_insert(0);

        if *count >= self.settings.max_samples {
            return false;
        }
        if !sample(self.settings.sample_rate) {
            return false;
        }
        *count += 1;
        true
    }
}

impl Filter for SamplingFilter {
    fn apply(&self, entry: &mut LogEntry) -> Result<FilterDecision> {
        if self.decide(entry) {
            self.sampled.fetch_add(1, Ordering::Relaxed);
            Ok(FilterDecision::Keep)
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            Ok(FilterDecision::Drop)
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn build(config: &FilterConfig) -> Result<Box<dyn Filter>> {
    let settings = &config.settings;
    let mut sampling = SamplingSettings::new(settings.get_f64("sample_rate").unwrap_or(1.0));
    if let Some(field) = settings.get_str("key_field").filter(|f| !f.is_empty()) {
        sampling = sampling.with_key(field, settings.get_u64("max_samples").unwrap_or(0));
    }
    Ok(Box::new(SamplingFilter::new(config.name.clone(), sampling)?))
}

/// Factory registered under the `sampling` type
pub fn factory() -> FilterFactory {
    Arc::new(build)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LogLevel;

    fn entry(user: &str) -> LogEntry {
        LogEntry::new(LogLevel::Info, "request").with_field("user", user)
    }

    #[test]
    fn test_full_rate_never_drops() {
        let filter = SamplingFilter::new("s", SamplingSettings::new(1.0)).unwrap();
        for _ in 0..1000 {
            assert_eq!(filter.apply(&mut entry("a")).unwrap(), FilterDecision::Keep);
        }
        assert_eq!(filter.dropped_count(), 0);
    }

    #[test]
    fn test_zero_rate_drops_everything() {
        let filter = SamplingFilter::new("s", SamplingSettings::new(0.0)).unwrap();
        for _ in 0..100 {
            assert_eq!(filter.apply(&mut entry("a")).unwrap(), FilterDecision::Drop);
        }
    }

    #[test]
    fn test_key_limit_drops_after_max() {
        let filter = SamplingFilter::new("s", SamplingSettings::new(1.0).with_key("user", 3)).unwrap();

        for _ in 0..3 {
            assert_eq!(filter.apply(&mut entry("alice")).unwrap(), FilterDecision::Keep);
        }
        assert_eq!(filter.apply(&mut entry("alice")).unwrap(), FilterDecision::Drop);
        assert_eq!(filter.apply(&mut entry("bob")).unwrap(), FilterDecision::Keep);
        assert_eq!(filter.key_count("alice"), 3);
    }

    #[test]
    fn test_only_survivors_are_counted() {
        let filter = SamplingFilter::new("s", SamplingSettings::new(0.0).with_key("user", 1)).unwrap();
        filter.apply(&mut entry("alice")).unwrap();
        assert_eq!(filter.key_count("alice"), 0);
    }

    #[test]
    fn test_counters_follow_key_cardinality() {
        let bounded = SamplingFilter::new("s", SamplingSettings::new(1.0).with_key("user", 2)).unwrap();
        let unbounded = SamplingFilter::new("s", SamplingSettings::new(1.0).with_key("user", 0)).unwrap();
        for i in 0..50 {
            let user = format!("user-{}", i);
            bounded.apply(&mut entry(&user)).unwrap();
            assert_eq!(unbounded.apply(&mut entry(&user)).unwrap(), FilterDecision::Keep);
        }

        assert_eq!(bounded.tracked_keys(), 50);
        assert_eq!(unbounded.tracked_keys(), 0);
    }

    #[test]
    fn test_statistical_rate() {
        let filter = SamplingFilter::new("s", SamplingSettings::new(0.5)).unwrap();
        for _ in 0..10_000 {
            filter.apply(&mut entry("a")).unwrap();
        }
        let kept = filter.sampled_count() as f64 / 10_000.0;
        assert!((0.4..=0.6).contains(&kept), "kept ratio {}", kept);
    }

    #[test]
    fn test_rate_out_of_range_is_rejected() {
        assert!(SamplingFilter::new("s", SamplingSettings::new(1.5)).is_err());
    }
}
