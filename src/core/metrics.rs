//! Pipeline metrics for observability
//!
//! Counts entries, errors and drops across the whole pipeline and keeps
//! per-output write statistics including latency percentiles. Readers get
//! an owned [`MetricsSnapshot`]; the live counters are never exposed.

use super::log_level::LogLevel;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Number of recent write latencies kept per output
pub const LATENCY_WINDOW: usize = 1024;

const NO_TIMESTAMP: i64 = i64::MIN;

fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}

fn load_timestamp(cell: &AtomicI64) -> Option<DateTime<Utc>> {
    match cell.load(Ordering::Relaxed) {
        NO_TIMESTAMP => None,
        micros => Utc.timestamp_micros(micros).single(),
    }
}

/// Live statistics for one output
#[derive(Debug)]
struct OutputStats {
    entries: AtomicU64,
    errors: AtomicU64,
    bytes: AtomicU64,
    last_write: AtomicI64,
    healthy: AtomicBool,
    latencies: Mutex<VecDeque<Duration>>,
}

impl OutputStats {
    fn new() -> Self {
        Self {
            entries: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            last_write: AtomicI64::new(NO_TIMESTAMP),
            healthy: AtomicBool::new(true),
            latencies: Mutex::new(VecDeque::with_capacity(LATENCY_WINDOW)),
        }
    }

    fn push_latency(&self, latency: Duration) {
        let mut window = self.latencies.lock();
        if window.len() == LATENCY_WINDOW {
            window.pop_front();
        }
        window.push_back(latency);
    }

    fn snapshot(&self) -> OutputMetrics {
        let mut samples: Vec<Duration> = self.latencies.lock().iter().copied().collect();
        samples.sort_unstable();

        OutputMetrics {
            entries: self.entries.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            last_write: load_timestamp(&self.last_write),
            healthy: self.healthy.load(Ordering::Relaxed),
            latency: LatencySummary {
                samples: samples.len(),
                p50: percentile(&samples, 50.0),
                p95: percentile(&samples, 95.0),
                p99: percentile(&samples, 99.0),
            },
        }
    }
}

/// Nearest-rank percentile over sorted samples
fn percentile(sorted: &[Duration], pct: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let rank = ((pct / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

/// Latency percentiles over the recent write window
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    pub samples: usize,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

/// Snapshot of one output's statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputMetrics {
    pub entries: u64,
    pub errors: u64,
    pub bytes: u64,
    pub last_write: Option<DateTime<Utc>>,
    /// False after a failed write, true again after the next success
    pub healthy: bool,
    pub latency: LatencySummary,
}

/// Deep copy of the pipeline metrics at one point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub entries_total: u64,
    pub entries_by_level: BTreeMap<LogLevel, u64>,
    pub errors_total: u64,
    pub dropped_total: u64,
    pub outputs: BTreeMap<String, OutputMetrics>,
    pub sample_rate: f64,
    pub last_activity: Option<DateTime<Utc>>,
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Get drop rate as a percentage (0.0 - 100.0)
    pub fn drop_rate(&self) -> f64 {
        if self.entries_total == 0 {
            0.0
        } else {
            (self.dropped_total as f64 / self.entries_total as f64) * 100.0
        }
    }
}

/// Process-wide metrics of one pipeline
///
/// # Example
///
/// ```
/// use rust_log_pipeline::{LogLevel, LogMetrics};
///
/// let metrics = LogMetrics::new();
/// metrics.record_entry(LogLevel::Info);
/// metrics.record_dropped();
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.entries_total, 1);
/// assert_eq!(snapshot.dropped_total, 1);
/// ```
#[derive(Debug)]
pub struct LogMetrics {
    entries_total: AtomicU64,
    entries_by_level: [AtomicU64; 7],
    errors_total: AtomicU64,
    dropped_total: AtomicU64,
    sample_rate: AtomicU64,
    last_activity: AtomicI64,
    started: Mutex<Instant>,
    outputs: RwLock<HashMap<String, Arc<OutputStats>>>,
}

impl LogMetrics {
    pub fn new() -> Self {
        Self {
            entries_total: AtomicU64::new(0),
            entries_by_level: Default::default(),
            errors_total: AtomicU64::new(0),
            dropped_total: AtomicU64::new(0),
            sample_rate: AtomicU64::new(1.0f64.to_bits()),
            last_activity: AtomicI64::new(NO_TIMESTAMP),
            started: Mutex::new(Instant::now()),
            outputs: RwLock::new(HashMap::new()),
        }
    }

    fn output(&self, name: &str) -> Arc<OutputStats> {
        if let Some(stats) = self.outputs.read().get(name) {
            return Arc::clone(stats);
        }
        Arc::clone(
            self.outputs
                .write()
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(OutputStats::new())),
        )
    }

    /// Record an entry entering the pipeline
    #[inline]
    pub fn record_entry(&self, level: LogLevel) {
        self.entries_total.fetch_add(1, Ordering::Relaxed);
        self.entries_by_level[level.index()].fetch_add(1, Ordering::Relaxed);
        self.last_activity.store(now_micros(), Ordering::Relaxed);
    }

    #[inline]
    pub fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped(&self) {
        self.dropped_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful write to an output
    pub fn record_output_write(&self, name: &str, bytes: usize, latency: Duration) {
        let stats = self.output(name);
        stats.entries.fetch_add(1, Ordering::Relaxed);
        stats.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        stats.last_write.store(now_micros(), Ordering::Relaxed);
        stats.healthy.store(true, Ordering::Relaxed);
        stats.push_latency(latency);
    }

    /// Record a failed write to an output
    pub fn record_output_error(&self, name: &str, latency: Duration) {
        let stats = self.output(name);
        stats.errors.fetch_add(1, Ordering::Relaxed);
        stats.healthy.store(false, Ordering::Relaxed);
        stats.push_latency(latency);
        self.record_error();
    }

    /// Forget statistics of an output that no longer exists
    pub fn remove_output(&self, name: &str) {
        self.outputs.write().remove(name);
    }

    pub fn set_sample_rate(&self, rate: f64) {
        self.sample_rate.store(rate.to_bits(), Ordering::Relaxed);
    }

    /// Restart the uptime clock
    pub fn mark_started(&self) {
        *self.started.lock() = Instant::now();
    }

    #[inline]
    pub fn entries_total(&self) -> u64 {
        self.entries_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn errors_total(&self) -> u64 {
        self.errors_total.load(Ordering::Relaxed)
    }

    /// Take an owned copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        let entries_by_level = LogLevel::ALL
            .iter()
            .map(|level| {
                (
                    *level,
                    self.entries_by_level[level.index()].load(Ordering::Relaxed),
                )
            })
            .collect();

        let outputs = self
            .outputs
            .read()
            .iter()
            .map(|(name, stats)| (name.clone(), stats.snapshot()))
            .collect();

        MetricsSnapshot {
            entries_total: self.entries_total(),
            entries_by_level,
            errors_total: self.errors_total(),
            dropped_total: self.dropped_total(),
            outputs,
            sample_rate: f64::from_bits(self.sample_rate.load(Ordering::Relaxed)),
            last_activity: load_timestamp(&self.last_activity),
            uptime: self.started.lock().elapsed(),
        }
    }

    /// Reset all counters to zero
    pub fn reset(&self) {
        self.entries_total.store(0, Ordering::Relaxed);
        for counter in &self.entries_by_level {
            counter.store(0, Ordering::Relaxed);
        }
        self.errors_total.store(0, Ordering::Relaxed);
        self.dropped_total.store(0, Ordering::Relaxed);
        self.last_activity.store(NO_TIMESTAMP, Ordering::Relaxed);
        self.outputs.write().clear();
    }
}

impl Default for LogMetrics {
    fn default() -> Self {
        Self::new()
    }
}
