//! Integration tests for the logging pipeline
//!
//! These tests verify:
//! - Configuration driven pipelines (outputs, filters, hooks)
//! - Fan-out isolation and error aggregation
//! - Buffered batching
//! - Shutdown error reporting
//! - Configuration persistence
//! - Log injection prevention

use rust_log_pipeline::outputs::{BufferedOutput, MultiOutput};
use rust_log_pipeline::prelude::*;
use rust_log_pipeline::{OutputContext, Settings};
use std::fs;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Output that keeps every entry it is given
struct Recorder {
    name: String,
    level: LogLevel,
    enabled: AtomicBool,
    fail_writes: bool,
    fail_close: bool,
    writes: AtomicUsize,
    flushes: AtomicUsize,
    entries: Mutex<Vec<LogEntry>>,
}

impl Recorder {
    fn with(name: &str, level: LogLevel, fail_writes: bool, fail_close: bool) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            level,
            enabled: AtomicBool::new(true),
            fail_writes,
            fail_close,
            writes: AtomicUsize::new(0),
            flushes: AtomicUsize::new(0),
            entries: Mutex::new(Vec::new()),
        })
    }

    fn new(name: &str) -> Arc<Self> {
        Self::with(name, LogLevel::Trace, false, false)
    }

    fn messages(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.message.clone())
            .collect()
    }
}

impl Output for Recorder {
    fn write(&self, entry: &LogEntry) -> Result<usize> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(LoggerError::write(&self.name, "disk full"));
        }
        self.entries.lock().unwrap().push(entry.clone());
        Ok(entry.message.len())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn level(&self) -> LogLevel {
        self.level
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn flush(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if self.fail_close {
            Err(LoggerError::other("close failed"))
        } else {
            Ok(())
        }
    }
}

fn started(config: LogConfig) -> (Manager, Arc<Recorder>) {
    let manager = Manager::new(config);
    manager.start().expect("Failed to start manager");
    let sink = Recorder::new("sink");
    manager.add_output(sink.clone());
    (manager, sink)
}

#[test]
fn test_log_injection_prevention() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("injection_test.log");

    let manager = Manager::new(
        LogConfig::empty().with_output(
            OutputConfig::new("file", "file").with_setting("path", log_file.to_str().unwrap()),
        ),
    );
    manager.start().unwrap();

    let malicious_message = "User login\nERROR [2024-10-17] Fake error injected\nINFO Continuation";
    manager.get_logger("auth").info(malicious_message);
    manager.stop().expect("Failed to stop");

    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    assert!(content.contains("\\n"));
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 1, "Log should be a single line, not multiple");
}

#[test]
fn test_output_level_threshold_and_json_lines() {
    let temp_dir = TempDir::new().unwrap();
    let log_file = temp_dir.path().join("warn.json");

    let manager = Manager::new(
        LogConfig::empty().with_level("trace").with_output(
            OutputConfig::new("json", "file")
                .with_level("warn")
                .with_format("json")
                .with_setting("path", log_file.to_str().unwrap()),
        ),
    );
    manager.start().unwrap();

    let logger = manager.get_logger("billing").with_field("invoice", 42);
    for level in LogLevel::ALL {
        logger.log(level, format!("at {}", level));
    }
    manager.stop().unwrap();

    let content = fs::read_to_string(&log_file).unwrap();
    let entries: Vec<LogEntry> = content
        .lines()
        .map(|line| serde_json::from_str(line).expect("line is a JSON entry"))
        .collect();

    let levels: Vec<LogLevel> = entries.iter().map(|e| e.level).collect();
    assert_eq!(
        levels,
        vec![LogLevel::Warn, LogLevel::Error, LogLevel::Fatal, LogLevel::Panic]
    );
    assert!(entries.iter().all(|e| e.component == "billing"));
    assert_eq!(entries[0].fields["invoice"], FieldValue::from(42));
}

#[test]
fn test_multi_output_writes_every_member() {
    let a = Recorder::new("a");
    let b = Recorder::with("b", LogLevel::Trace, true, false);
    let c = Recorder::new("c");
    let members: Vec<Arc<dyn Output>> = vec![a.clone(), b.clone(), c.clone()];
    let multi = MultiOutput::new("fan-out", LogLevel::Trace, members);

    let result = multi.write(&LogEntry::new(LogLevel::Info, "payload"));

    assert!(result.is_err());
    let total = a.writes.load(Ordering::SeqCst) + b.writes.load(Ordering::SeqCst) + c.writes.load(Ordering::SeqCst);
    assert_eq!(total, 3);
    assert_eq!(a.messages(), vec!["payload"]);
    assert_eq!(c.messages(), vec!["payload"]);
}

#[test]
fn test_buffered_output_flushes_full_batch() {
    let inner = Recorder::new("inner");
    let buffered = BufferedOutput::new("batched", LogLevel::Trace, inner.clone(), 4, None).unwrap();

    for i in 0..3 {
        buffered.write(&LogEntry::new(LogLevel::Info, format!("m{}", i))).unwrap();
    }
    assert_eq!(inner.writes.load(Ordering::SeqCst), 0);
    assert_eq!(buffered.pending(), 3);

    buffered.write(&LogEntry::new(LogLevel::Info, "m3")).unwrap();

    assert_eq!(inner.flushes.load(Ordering::SeqCst), 1);
    assert_eq!(inner.messages(), vec!["m0", "m1", "m2", "m3"]);
    assert_eq!(buffered.pending(), 0);
}

#[test]
fn test_component_filter_substring_rules() {
    let (manager, sink) = started(LogConfig::empty().with_filter(
        FilterConfig::new("components", "component")
            .with_setting("allowed", serde_json::json!(["api"]))
            .with_setting("denied", serde_json::json!(["test"])),
    ));

    manager.get_logger("api-gateway").info("kept");
    manager.get_logger("api-test").info("denied wins");
    manager.get_logger("worker").info("not allowed");

    assert_eq!(sink.messages(), vec!["kept"]);
    assert_eq!(manager.get_metrics().dropped_total, 2);
}

#[test]
fn test_field_filter_case_insensitive_contains() {
    let (manager, sink) = started(LogConfig::empty().with_filter(
        FilterConfig::new("timeouts", "field")
            .with_action("drop")
            .with_rule(FilterRule::new("message", "contains", "timeout").case_insensitive()),
    ));

    let logger = manager.get_logger("net");
    logger.warn("Connection TIMEOUT");
    logger.warn("Connection reset");

    assert_eq!(sink.messages(), vec!["Connection reset"]);
}

#[test]
fn test_filters_run_in_order() {
    let (manager, sink) = started(
        LogConfig::empty()
            .with_level("trace")
            .with_filter(
                FilterConfig::new("levels", "level")
                    .with_setting("min_level", "debug")
                    .with_setting("deny", serde_json::json!(["warn"])),
            )
            .with_filter(
                FilterConfig::new("keep-errors", "field")
                    .with_action("allow")
                    .with_rule(FilterRule::new("level", "equals", "error")),
            ),
    );

    let logger = manager.get_logger("svc");
    logger.trace("below min");
    logger.debug("debug");
    logger.warn("denied");
    logger.error("error");

    assert_eq!(sink.messages(), vec!["debug", "error"]);
}

#[test]
fn test_stop_reports_failing_close() {
    let manager = Manager::new(LogConfig::empty());
    manager.start().unwrap();
    manager.add_output(Recorder::with("stubborn", LogLevel::Trace, false, true));
    manager.add_output(Recorder::new("fine"));

    match manager.stop() {
        Err(LoggerError::Shutdown { failures }) => {
            assert_eq!(failures.sources(), vec!["stubborn"]);
        }
        other => panic!("expected shutdown error, got {:?}", other.err()),
    }
    assert!(!manager.is_started());

    // a stopped manager can be started again
    manager.start().unwrap();
    assert!(manager.is_started());
}

#[test]
fn test_failing_output_is_isolated_and_counted() {
    let (manager, sink) = started(LogConfig::empty());
    manager.add_output(Recorder::with("broken", LogLevel::Trace, true, false));

    let logger = manager.get_logger("svc");
    logger.info("one");
    logger.info("two");

    assert_eq!(sink.messages(), vec!["one", "two"]);
    let snapshot = manager.get_metrics();
    assert_eq!(snapshot.entries_total, 2);
    assert_eq!(snapshot.errors_total, 2);
    assert_eq!(snapshot.outputs["broken"].errors, 2);
    assert_eq!(snapshot.outputs["sink"].entries, 2);
}

#[test]
fn test_save_and_load_config_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let config = LogConfig::empty()
        .with_level("debug")
        .with_format("logfmt")
        .with_output(
            OutputConfig::new("app", "file")
                .with_level("warn")
                .with_setting("path", temp_dir.path().join("app.log").to_str().unwrap())
                .with_setting("max_backups", 5),
        )
        .with_component("db", ComponentConfig::default().with_level("error").with_sample_rate(0.5))
        .with_hook(
            HookConfig::new("audit", "audit")
                .with_levels(&["error"])
                .with_setting("path", temp_dir.path().join("audit.log").to_str().unwrap()),
        )
        .with_filter(
            FilterConfig::new("no-health", "field")
                .with_action("drop")
                .with_rule(FilterRule::new("message", "starts_with", "GET /health")),
        );

    for file in ["config.json", "config.toml"] {
        let path = temp_dir.path().join(file);
        let manager = Manager::new(config.clone());
        manager.save_config(&path).unwrap();

        let restored = Manager::new(LogConfig::empty());
        restored.load_config(&path).unwrap();
        assert_eq!(restored.get_config(), config, "roundtrip through {}", file);
    }
}

#[test]
fn test_audit_hook_from_config() {
    let temp_dir = TempDir::new().unwrap();
    let audit_path = temp_dir.path().join("audit.log");
    let (manager, _sink) = started(LogConfig::empty().with_hook(
        HookConfig::new("audit", "audit")
            .with_levels(&["error", "fatal"])
            .with_setting("path", audit_path.to_str().unwrap()),
    ));

    let logger = manager.get_logger("auth").with_user_id("mallory");
    logger.info("login ok");
    logger.error("privilege escalation attempt");

    let content = fs::read_to_string(&audit_path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 1);
    let entry: LogEntry = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(entry.user_id.as_deref(), Some("mallory"));
}

fn build_recorder(config: &OutputConfig, _ctx: &OutputContext<'_>) -> Result<Box<dyn Output>> {
    Ok(Box::new(Recorder {
        name: config.name.clone(),
        level: LogLevel::Trace,
        enabled: AtomicBool::new(true),
        fail_writes: false,
        fail_close: false,
        writes: AtomicUsize::new(0),
        flushes: AtomicUsize::new(0),
        entries: Mutex::new(Vec::new()),
    }))
}

#[test]
fn test_user_factory_overrides_builtin() {
    let manager = Manager::new(LogConfig::empty().with_output(OutputConfig::new("console", "console")));
    manager.register_output_factory("console", Arc::new(build_recorder));
    manager.start().unwrap();

    let output = manager.output("console").unwrap();
    manager.get_logger("svc").info("captured");
    assert_eq!(manager.get_metrics().outputs["console"].entries, 1);
    assert_eq!(output.name(), "console");
}

#[test]
fn test_unregistered_type_fails_start() {
    let manager = Manager::new(LogConfig::empty().with_filter(FilterConfig::new("mystery", "regex")));
    let err = manager.start().unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("regex"));
    assert!(!manager.is_started());
}

#[test]
fn test_failed_update_keeps_committed_outputs() {
    let temp_dir = TempDir::new().unwrap();
    let (manager, _sink) = started(LogConfig::empty());

    let update = LogConfig::empty()
        .with_level("warn")
        .with_output(
            OutputConfig::new("file", "file")
                .with_setting("path", temp_dir.path().join("new.log").to_str().unwrap()),
        )
        .with_filter(FilterConfig::new("mystery", "regex"));

    assert!(manager.update_config(update).is_err());
    assert_eq!(manager.output_names(), vec!["file"]);
    assert_eq!(manager.get_config().level, "info");
}

#[test]
fn test_syslog_output_from_config() {
    let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
    receiver.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let address = receiver.local_addr().unwrap().to_string();

    let manager = Manager::new(
        LogConfig::empty().with_output(
            OutputConfig::new("syslog", "syslog")
                .with_setting("network", "udp")
                .with_setting("address", address.as_str())
                .with_setting("facility", "local0")
                .with_setting("tag", "billing"),
        ),
    );
    manager.start().unwrap();
    manager.get_logger("jobs").warn("queue backlog");

    let mut buf = [0u8; 2048];
    let len = receiver.recv(&mut buf).unwrap();
    let datagram = String::from_utf8_lossy(&buf[..len]);
    assert!(datagram.starts_with("<132>"), "got {}", datagram);
    assert!(datagram.contains("billing["));
    assert!(datagram.contains("queue backlog"));
}

#[test]
fn test_create_output_at_runtime() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("late.log");
    let manager = Manager::new(LogConfig::empty());
    manager.start().unwrap();

    let mut settings = Settings::new();
    settings.insert("path", path.to_str().unwrap());
    let mut output = OutputConfig::new("late", "file");
    output.settings = settings;
    manager.create_output(output).unwrap();

    manager.get_logger("svc").info("after create");
    manager.flush().unwrap();
    assert!(fs::read_to_string(&path).unwrap().contains("after create"));
    assert!(manager.get_config().outputs.contains_key("late"));
}
