//! Property-based tests for rust_log_pipeline using proptest

use proptest::prelude::*;
use rust_log_pipeline::filters::{ComponentFilter, LevelFilter, SamplingFilter, SamplingSettings};
use rust_log_pipeline::prelude::*;

fn any_level() -> impl Strategy<Value = LogLevel> {
    prop::sample::select(LogLevel::ALL.to_vec())
}

fn level_subset() -> impl Strategy<Value = Vec<LogLevel>> {
    prop::sample::subsequence(LogLevel::ALL.to_vec(), 0..=LogLevel::ALL.len())
}

// ============================================================================
// LogLevel Tests
// ============================================================================

proptest! {
    /// Config names parse back to the same level
    #[test]
    fn test_log_level_config_roundtrip(level in any_level()) {
        let parsed: LogLevel = level.as_config_str().parse().unwrap();
        prop_assert_eq!(level, parsed);
    }

    /// Parsing ignores case
    #[test]
    fn test_log_level_case_insensitive(level in any_level(), upper in any::<bool>()) {
        let text = if upper {
            level.as_config_str().to_uppercase()
        } else {
            level.as_config_str().to_string()
        };
        prop_assert_eq!(text.parse::<LogLevel>().unwrap(), level);
    }
}

// ============================================================================
// Output Level Threshold
// ============================================================================

struct Threshold {
    level: LogLevel,
}

impl Output for Threshold {
    fn write(&self, entry: &LogEntry) -> Result<usize> {
        Ok(entry.message.len())
    }
    fn name(&self) -> &str {
        "threshold"
    }
    fn level(&self) -> LogLevel {
        self.level
    }
    fn is_enabled(&self) -> bool {
        true
    }
    fn set_enabled(&self, _enabled: bool) {}
    fn flush(&self) -> Result<()> {
        Ok(())
    }
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

proptest! {
    /// An output with minimum level L accepts exactly the entries at or above L
    #[test]
    fn test_output_accepts_at_or_above_level(min in any_level(), level in any_level()) {
        let output = Threshold { level: min };
        let entry = LogEntry::new(level, "m");
        prop_assert_eq!(output.accepts(&entry), level >= min);
    }
}

// ============================================================================
// Filter Properties
// ============================================================================

proptest! {
    /// A denied level is dropped even when it is also allowed
    #[test]
    fn test_deny_beats_allow(allow in level_subset(), deny in level_subset(), level in any_level()) {
        let filter = LevelFilter::new("lvl").with_allow(&allow).with_deny(&deny);
        let mut entry = LogEntry::new(level, "m");
        let decision = filter.apply(&mut entry).unwrap();

        if deny.contains(&level) {
            prop_assert_eq!(decision, FilterDecision::Drop);
        } else if !allow.is_empty() && !allow.contains(&level) {
            prop_assert_eq!(decision, FilterDecision::Drop);
        } else {
            prop_assert_eq!(decision, FilterDecision::Keep);
        }
    }

    /// Sampling at rate 1.0 without a key never drops
    #[test]
    fn test_full_rate_never_drops(levels in prop::collection::vec(any_level(), 1..200)) {
        let filter = SamplingFilter::new("all", SamplingSettings::new(1.0)).unwrap();
        for level in levels {
            let mut entry = LogEntry::new(level, "m");
            prop_assert_eq!(filter.apply(&mut entry).unwrap(), FilterDecision::Keep);
        }
        prop_assert_eq!(filter.dropped_count(), 0);
    }

    /// Once a key has `max_samples` survivors the next entry for it is dropped
    #[test]
    fn test_keyed_max_samples_caps_survivors(max in 1u64..20, rate in 0.0f64..=1.0, extra in 1usize..20) {
        let filter = SamplingFilter::new(
            "per-user",
            SamplingSettings::new(rate).with_key("user", max),
        )
        .unwrap();

        let mut survivors = 0u64;
        // enough attempts to exhaust the budget at rate 1.0
        for _ in 0..(max as usize + extra) {
            let mut entry = LogEntry::new(LogLevel::Info, "m").with_field("user", "alice");
            if filter.apply(&mut entry).unwrap() == FilterDecision::Keep {
                survivors += 1;
            }
        }
        prop_assert!(survivors <= max);

        if filter.key_count("alice") == max {
            let mut entry = LogEntry::new(LogLevel::Info, "m").with_field("user", "alice");
            prop_assert_eq!(filter.apply(&mut entry).unwrap(), FilterDecision::Drop);
        }
    }

    /// Denied substrings win over allowed ones
    #[test]
    fn test_component_deny_first(prefix in "[a-z]{1,8}", suffix in "[a-z]{1,8}") {
        let filter = ComponentFilter::new("c", vec![prefix.clone()], vec![suffix.clone()]);
        let mut entry = LogEntry::new(LogLevel::Info, "m")
            .with_component(format!("{}-{}", prefix, suffix));
        prop_assert_eq!(filter.apply(&mut entry).unwrap(), FilterDecision::Drop);
    }
}

// ============================================================================
// Configuration Round-trip
// ============================================================================

fn config_strategy() -> impl Strategy<Value = LogConfig> {
    (
        any_level(),
        prop::sample::select(vec!["text", "json", "console", "logfmt"]),
        any::<bool>(),
        prop::collection::btree_map("[a-z]{1,6}", (any_level(), any::<bool>()), 0..4),
        prop::collection::vec(("[a-z]{1,6}", "[a-z ]{0,12}"), 0..3),
    )
        .prop_map(|(level, format, caller, components, rules)| {
            let mut config = LogConfig::empty()
                .with_level(level.as_config_str())
                .with_format(format)
                .with_output(OutputConfig::new("console", "console").with_level("warn"));
            config.caller = caller;
            for (name, (component_level, enabled)) in components {
                let mut component = ComponentConfig::default().with_level(component_level.as_config_str());
                component.enabled = enabled;
                config = config.with_component(name, component);
            }
            for (idx, (field, value)) in rules.into_iter().enumerate() {
                config = config.with_filter(
                    FilterConfig::new(format!("rule-{}", idx), "field")
                        .with_action("drop")
                        .with_rule(FilterRule::new(field, "contains", value)),
                );
            }
            config
        })
}

proptest! {
    #[test]
    fn test_config_json_roundtrip(config in config_strategy()) {
        let text = config.to_json().unwrap();
        prop_assert_eq!(LogConfig::from_json(&text).unwrap(), config);
    }

    #[test]
    fn test_config_toml_roundtrip(config in config_strategy()) {
        let text = config.to_toml().unwrap();
        prop_assert_eq!(LogConfig::from_toml(&text).unwrap(), config);
    }

    /// Every generated configuration passes validation
    #[test]
    fn test_generated_config_is_valid(config in config_strategy()) {
        prop_assert!(config.validate().is_ok());
    }
}
