//! Configuration-driven pipeline example
//!
//! Demonstrates a console output, a rotating JSON file, a drop filter,
//! a callback hook and the pipeline metrics.
//!
//! Run with: cargo run --example pipeline

use rust_log_pipeline::hooks::CallbackHook;
use rust_log_pipeline::prelude::*;
use rust_log_pipeline::{info, warn};
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== Rust Log Pipeline - Example ===\n");

    let log_dir = std::env::temp_dir().join("rust_log_pipeline_demo");
    let log_file = log_dir.join("app.log");

    let config = LogConfig::default()
        .with_level("debug")
        .with_output(
            OutputConfig::new("json-file", "file")
                .with_format("json")
                .with_level("info")
                .with_setting("path", log_file.to_string_lossy().to_string())
                .with_setting("max_size", 10)
                .with_setting("max_backups", 2)
                .with_setting("compress", true),
        )
        .with_component("db", ComponentConfig::default().with_level("warn"))
        .with_filter(
            FilterConfig::new("no-health", "field")
                .with_action("drop")
                .with_rule(FilterRule::new("message", "starts_with", "GET /health")),
        )
        .with_hook(HookConfig::new("pager", "pager").with_levels(&["error", "fatal"]));

    let manager = Manager::new(config);
    manager.register_hook_factory(
        "pager",
        CallbackHook::factory(|entry: &LogEntry| {
            println!("   >> paging on-call: {}", entry.message);
            Ok(())
        }),
    );
    manager.start()?;

    println!("1. Logging from components:");
    let http = manager.get_logger("http").with_field("service", "checkout");
    http.debug("router ready");
    http.info("GET /health 200");
    http.info("GET /orders 200");
    manager.get_logger("db").info("hidden by the component level");
    manager.get_logger("db").warn("slow query");

    println!("\n2. Context, errors and durations:");
    let ctx = LogContext::new().with_request_id("req-7").with_user_id("alice");
    http.info_ctx(&ctx, "order placed");
    let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "payment gateway timed out");
    http.log_error("charge failed", &err);
    http.log_duration(LogLevel::Info, "request handled", Duration::from_millis(87));

    println!("\n3. Macros:");
    info!(http, "cart has {} items", 3);
    warn!(http, "retry" => 2; "inventory lookup retried");

    println!("\n4. Metrics:");
    let metrics = manager.get_metrics();
    println!("   entries: {}", metrics.entries_total);
    println!("   dropped: {} ({:.1}%)", metrics.dropped_total, metrics.drop_rate());
    for (name, output) in &metrics.outputs {
        println!("   output {}: {} entries, {} bytes", name, output.entries, output.bytes);
    }

    manager.stop()?;
    println!("\nJSON lines written to {}", log_file.display());

    println!("\n=== Example completed successfully! ===");
    Ok(())
}
