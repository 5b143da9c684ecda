//! Pipeline manager: registries, configuration lifecycle and dispatch
//!
//! A [`Manager`] is a cheap, cloneable handle. Every clone shares the same
//! registries of loggers, outputs, filters, hooks and factories, all kept
//! behind one read-write lock. Dispatch only holds the read lock long
//! enough to clone the `Arc` lists; writes to outputs happen outside it.

use super::config::{ComponentConfig, LogConfig, OutputConfig};
use super::error::{ErrorList, LoggerError, Result};
use super::filter::{Filter, FilterChain};
use super::hook::Hook;
use super::log_context::{FieldValue, Fields};
use super::log_entry::LogEntry;
use super::log_level::LogLevel;
use super::logger::{ComponentState, Logger};
use super::metrics::{LogMetrics, MetricsSnapshot};
use super::output::Output;
use super::registry::{FilterFactory, HookFactory, OutputContext, OutputFactory, Registry};
use crate::{filters, hooks, outputs};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A named logger's adjustable state plus its fixed fields
struct RegisteredLogger {
    state: Arc<RwLock<ComponentState>>,
    fields: Fields,
}

struct State {
    config: LogConfig,
    loggers: HashMap<String, RegisteredLogger>,
    outputs: BTreeMap<String, Arc<dyn Output>>,
    filters: FilterChain,
    hooks: Vec<Arc<dyn Hook>>,
    output_factories: Registry<OutputFactory>,
    filter_factories: Registry<FilterFactory>,
    hook_factories: Registry<HookFactory>,
    started: bool,
}

/// State shared by a manager and every logger it hands out
pub(crate) struct Shared {
    state: RwLock<State>,
    metrics: LogMetrics,
    caller: AtomicBool,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Flush and close an output that left the registry
fn retire(output: &Arc<dyn Output>) -> ErrorList {
    let mut errors = ErrorList::new();
    for (step, result) in [
        ("flush", panic::catch_unwind(AssertUnwindSafe(|| output.flush()))),
        ("close", panic::catch_unwind(AssertUnwindSafe(|| output.close()))),
    ] {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => errors.push(output.name(), e),
            Err(payload) => errors.push(
                output.name(),
                LoggerError::other(format!("panicked during {}: {}", step, panic_message(&*payload))),
            ),
        }
    }
    errors
}

fn fields_from_config(component: Option<&ComponentConfig>) -> Fields {
    component
        .map(|c| {
            c.fields
                .iter()
                .map(|(k, v)| (k.clone(), FieldValue::from(v)))
                .collect()
        })
        .unwrap_or_default()
}

/// Effective state of a component; invalid levels fall back to defaults
fn component_state(config: &LogConfig, name: &str) -> ComponentState {
    let global = config.parsed_level().unwrap_or_default();
    let component = config.components.get(name);

    let level = component
        .map(|c| config.resolve_level(&c.level, name).unwrap_or(global))
        .unwrap_or(global);

    ComponentState {
        level,
        enabled: component.map_or(true, |c| c.enabled),
        sample_rate: component
            .and_then(|c| c.sample_rate)
            .unwrap_or(config.sample_rate),
    }
}

fn build_outputs(
    factories: &Registry<OutputFactory>,
    config: &LogConfig,
) -> Result<BTreeMap<String, Arc<dyn Output>>> {
    let ctx = OutputContext::new(config, factories);
    let mut built: BTreeMap<String, Arc<dyn Output>> = BTreeMap::new();

    for (name, output_config) in &config.outputs {
        match ctx.build(output_config) {
            Ok(output) => {
                built.insert(name.clone(), Arc::from(output));
            }
            Err(e) => {
                for output in built.values() {
                    let _ = output.close();
                }
                return Err(e);
            }
        }
    }
    Ok(built)
}

fn build_hooks(factories: &Registry<HookFactory>, config: &LogConfig) -> Result<Vec<Arc<dyn Hook>>> {
    let mut built = Vec::new();
    for hook in config.hooks.iter().filter(|h| h.enabled) {
        let factory = factories.get(&hook.kind)?;
        built.push(Arc::from(factory(hook)?));
    }
    Ok(built)
}

fn build_filters(factories: &Registry<FilterFactory>, config: &LogConfig) -> Result<FilterChain> {
    let mut chain = FilterChain::default();
    for filter in config.filters.iter().filter(|f| f.enabled) {
        let factory = factories.get(&filter.kind)?;
        chain.push(Arc::from(factory(filter)?));
    }
    Ok(chain)
}

impl Shared {
    pub(crate) fn metrics(&self) -> &LogMetrics {
        &self.metrics
    }

    pub(crate) fn caller_enabled(&self) -> bool {
        self.caller.load(Ordering::Relaxed)
    }

    /// Run one entry through filters, hooks and outputs
    ///
    /// Every failure is recorded in the metrics and returned together; a
    /// failing hook or output never stops the others.
    pub(crate) fn dispatch(&self, mut entry: LogEntry) -> Result<()> {
        self.metrics.record_entry(entry.level);

        let (filters, hooks, outputs) = {
            let state = self.state.read();
            (
                state.filters.clone(),
                state.hooks.clone(),
                state.outputs.values().cloned().collect::<Vec<_>>(),
            )
        };

        let outcome = filters.apply(&mut entry);
        let kept = outcome.kept();
        let mut errors = outcome.errors;
        for _ in 0..errors.len() {
            self.metrics.record_error();
        }
        if !kept {
            self.metrics.record_dropped();
            return errors.into_result();
        }

        for hook in hooks.iter().filter(|h| h.handles(entry.level)) {
            match panic::catch_unwind(AssertUnwindSafe(|| hook.fire(&entry))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.metrics.record_error();
                    errors.push(hook.name(), e);
                }
                Err(payload) => {
                    self.metrics.record_error();
                    errors.push(
                        hook.name(),
                        LoggerError::hook(hook.name(), format!("panicked: {}", panic_message(&*payload))),
                    );
                }
            }
        }

        for output in outputs.iter().filter(|o| o.accepts(&entry)) {
            let started = Instant::now();
            let result = panic::catch_unwind(AssertUnwindSafe(|| output.write(&entry)));
            let latency = started.elapsed();

            match result {
                Ok(Ok(bytes)) => self.metrics.record_output_write(output.name(), bytes, latency),
                Ok(Err(e)) => {
                    self.metrics.record_output_error(output.name(), latency);
                    errors.push(output.name(), e);
                }
                Err(payload) => {
                    self.metrics.record_output_error(output.name(), latency);
                    errors.push(
                        output.name(),
                        LoggerError::write(output.name(), format!("panicked: {}", panic_message(&*payload))),
                    );
                }
            }
        }

        errors.into_result()
    }

    /// Best-effort flush of every output
    pub(crate) fn flush(&self) -> Result<()> {
        let outputs: Vec<Arc<dyn Output>> = self.state.read().outputs.values().cloned().collect();

        let mut errors = ErrorList::new();
        for output in &outputs {
            match panic::catch_unwind(AssertUnwindSafe(|| output.flush())) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => errors.push(output.name(), e),
                Err(payload) => errors.push(
                    output.name(),
                    LoggerError::other(format!("panicked during flush: {}", panic_message(&*payload))),
                ),
            }
        }
        errors.into_result()
    }

    /// Rebuild outputs, hooks and filters from `config`, in that order
    fn apply(&self, state: &mut State, config: &LogConfig) -> Result<()> {
        let outputs = build_outputs(&state.output_factories, config)?;
        let previous = std::mem::replace(&mut state.outputs, outputs);
        for (name, output) in previous {
            let errors = retire(&output);
            if !errors.is_empty() {
                eprintln!(
                    "[LOGGER WARNING] Closing replaced output '{}' failed: {}",
                    name, errors
                );
            }
            if !state.outputs.contains_key(&name) {
                self.metrics.remove_output(&name);
            }
        }

        state.hooks = build_hooks(&state.hook_factories, config)?;
        state.filters = build_filters(&state.filter_factories, config)?;
        Ok(())
    }

    /// Store a configuration and push it into the registered loggers
    fn commit(&self, state: &mut State, config: LogConfig) {
        self.caller.store(config.caller, Ordering::Relaxed);
        self.metrics.set_sample_rate(config.sample_rate);

        for (name, logger) in state.loggers.iter_mut() {
            *logger.state.write() = component_state(&config, name);
            logger.fields = fields_from_config(config.components.get(name));
        }
        state.config = config;
    }
}

/// Handle to one logging pipeline
///
/// # Examples
///
/// ```
/// use rust_log_pipeline::{LogConfig, Manager};
///
/// let manager = Manager::new(LogConfig::empty().with_level("debug"));
/// manager.start().unwrap();
///
/// let logger = manager.get_logger("api");
/// logger.info("listening");
///
/// assert_eq!(manager.get_metrics().entries_total, 1);
/// manager.stop().unwrap();
/// ```
#[derive(Clone)]
pub struct Manager {
    shared: Arc<Shared>,
}

impl Default for Manager {
    fn default() -> Self {
        Self::new(LogConfig::default())
    }
}

impl Manager {
    /// A stopped manager holding `config`; nothing is built until [`Manager::start`]
    pub fn new(mut config: LogConfig) -> Self {
        config.normalize();
        let metrics = LogMetrics::new();
        metrics.set_sample_rate(config.sample_rate);
        let caller = AtomicBool::new(config.caller);

        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(State {
                    config,
                    loggers: HashMap::new(),
                    outputs: BTreeMap::new(),
                    filters: FilterChain::default(),
                    hooks: Vec::new(),
                    output_factories: Registry::new("output"),
                    filter_factories: Registry::new("filter"),
                    hook_factories: Registry::new("hook"),
                    started: false,
                }),
                metrics,
                caller,
            }),
        }
    }

    /// Register built-in factories and build the configured pipeline
    pub fn start(&self) -> Result<()> {
        let mut state = self.shared.state.write();
        if state.started {
            return Err(LoggerError::AlreadyStarted);
        }

        outputs::register_builtins(&mut state.output_factories);
        filters::register_builtins(&mut state.filter_factories);
        hooks::register_builtins(&mut state.hook_factories);

        let config = state.config.clone();
        config.validate()?;
        self.shared.apply(&mut state, &config)?;
        self.shared.commit(&mut state, config);

        state.started = true;
        self.shared.metrics.mark_started();
        Ok(())
    }

    /// Flush and close every output, then detach filters and hooks
    ///
    /// The manager is stopped afterwards even when some outputs fail; the
    /// failures come back together in [`LoggerError::Shutdown`]. Entries
    /// logged after `stop` reach no filter, hook or output.
    pub fn stop(&self) -> Result<()> {
        let mut state = self.shared.state.write();

        // loggers write straight through to the outputs and hold nothing to flush
        let mut failures = ErrorList::new();
        for output in std::mem::take(&mut state.outputs).values() {
            failures.append(retire(output));
        }
        state.hooks.clear();
        state.filters = FilterChain::default();
        state.started = false;

        if failures.is_empty() {
            Ok(())
        } else {
            Err(LoggerError::Shutdown { failures })
        }
    }

    pub fn is_started(&self) -> bool {
        self.shared.state.read().started
    }

    /// Best-effort flush of every output
    pub fn flush(&self) -> Result<()> {
        self.shared.flush()
    }

    /// Existing logger for `name`, or a new one built from the configuration
    pub fn get_logger(&self, name: &str) -> Logger {
        if let Some(logger) = self.registered_logger(name) {
            return logger;
        }

        let mut state = self.shared.state.write();
        let config = &state.config;
        let registered = RegisteredLogger {
            state: Arc::new(RwLock::new(component_state(config, name))),
            fields: fields_from_config(config.components.get(name)),
        };
        let logger = state
            .loggers
            .entry(name.to_string())
            .or_insert(registered);
        Logger::new(
            Arc::clone(&self.shared),
            name,
            Arc::clone(&logger.state),
            logger.fields.clone(),
        )
    }

    fn registered_logger(&self, name: &str) -> Option<Logger> {
        let state = self.shared.state.read();
        state.loggers.get(name).map(|logger| {
            Logger::new(
                Arc::clone(&self.shared),
                name,
                Arc::clone(&logger.state),
                logger.fields.clone(),
            )
        })
    }

    /// Create (or replace) a logger with an explicit component configuration
    pub fn create_logger(&self, name: &str, component: ComponentConfig) -> Result<Logger> {
        let mut state = self.shared.state.write();

        let level = state
            .config
            .resolve_level(&component.level, &format!("components.{}", name))?;
        state.config.parsed_format()?;
        if let Some(rate) = component.sample_rate {
            if !(0.0..=1.0).contains(&rate) {
                return Err(LoggerError::config(
                    format!("components.{}", name),
                    format!("sample_rate {} is outside [0, 1]", rate),
                ));
            }
        }

        let component_state = ComponentState {
            level,
            enabled: component.enabled,
            sample_rate: component.sample_rate.unwrap_or(state.config.sample_rate),
        };
        let fields = fields_from_config(Some(&component));
        state.config.components.insert(name.to_string(), component);

        let logger_state = match state.loggers.get_mut(name) {
            Some(existing) => {
                *existing.state.write() = component_state;
                existing.fields = fields.clone();
                Arc::clone(&existing.state)
            }
            None => {
                let shared = Arc::new(RwLock::new(component_state));
                state.loggers.insert(
                    name.to_string(),
                    RegisteredLogger {
                        state: Arc::clone(&shared),
                        fields: fields.clone(),
                    },
                );
                shared
            }
        };

        Ok(Logger::new(Arc::clone(&self.shared), name, logger_state, fields))
    }

    /// Names of the registered loggers, sorted
    pub fn logger_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shared.state.read().loggers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Validate and apply a new configuration
    ///
    /// Outputs, hooks and filters are rebuilt in that order and each
    /// collection replaces the live one only once it is fully built. If a
    /// later collection fails, earlier ones stay committed and the stored
    /// configuration is left unchanged. Before [`Manager::start`] the
    /// configuration is only validated and stored.
    pub fn update_config(&self, mut config: LogConfig) -> Result<()> {
        config.normalize();
        config.validate()?;

        let mut state = self.shared.state.write();
        if state.started {
            self.shared.apply(&mut state, &config)?;
        }
        self.shared.commit(&mut state, config);
        Ok(())
    }

    pub fn get_config(&self) -> LogConfig {
        self.shared.state.read().config.clone()
    }

    /// Read a JSON or TOML document and apply it
    pub fn load_config(&self, path: impl AsRef<Path>) -> Result<()> {
        self.update_config(LogConfig::from_file(path)?)
    }

    /// Write the current configuration as JSON or TOML, by file extension
    pub fn save_config(&self, path: impl AsRef<Path>) -> Result<()> {
        self.get_config().to_file(path)
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    pub fn register_output_factory(&self, kind: impl Into<String>, factory: OutputFactory) {
        self.shared.state.write().output_factories.register(kind, factory);
    }

    pub fn register_filter_factory(&self, kind: impl Into<String>, factory: FilterFactory) {
        self.shared.state.write().filter_factories.register(kind, factory);
    }

    pub fn register_hook_factory(&self, kind: impl Into<String>, factory: HookFactory) {
        self.shared.state.write().hook_factories.register(kind, factory);
    }

    /// Build an output through its factory and register it live
    ///
    /// The output is also recorded in the configuration, replacing (and
    /// closing) any output of the same name.
    pub fn create_output(&self, mut output: OutputConfig) -> Result<Arc<dyn Output>> {
        let mut state = self.shared.state.write();
        if output.name.is_empty() {
            return Err(LoggerError::config("outputs", "output name is empty"));
        }

        let built: Arc<dyn Output> = {
            let ctx = OutputContext::new(&state.config, &state.output_factories);
            Arc::from(ctx.build(&output)?)
        };
        output.name = built.name().to_string();

        if let Some(old) = state.outputs.insert(output.name.clone(), Arc::clone(&built)) {
            let errors = retire(&old);
            if !errors.is_empty() {
                eprintln!(
                    "[LOGGER WARNING] Closing replaced output '{}' failed: {}",
                    output.name, errors
                );
            }
        }
        state.config.outputs.insert(output.name.clone(), output);
        Ok(built)
    }

    /// Register an already-built output, replacing (and closing) any output
    /// of the same name; it is not recorded in the configuration
    pub fn add_output(&self, output: Arc<dyn Output>) {
        let old = self
            .shared
            .state
            .write()
            .outputs
            .insert(output.name().to_string(), output);
        if let Some(old) = old {
            let errors = retire(&old);
            if !errors.is_empty() {
                eprintln!(
                    "[LOGGER WARNING] Closing replaced output '{}' failed: {}",
                    old.name(),
                    errors
                );
            }
        }
    }

    /// Detach and close an output
    pub fn remove_output(&self, name: &str) -> Result<bool> {
        let removed = {
            let mut state = self.shared.state.write();
            state.config.outputs.remove(name);
            state.outputs.remove(name)
        };
        match removed {
            Some(output) => {
                self.shared.metrics.remove_output(name);
                retire(&output).into_result().map(|_| true)
            }
            None => Ok(false),
        }
    }

    pub fn output(&self, name: &str) -> Option<Arc<dyn Output>> {
        self.shared.state.read().outputs.get(name).cloned()
    }

    /// Live output names, sorted
    pub fn output_names(&self) -> Vec<String> {
        self.shared.state.read().outputs.keys().cloned().collect()
    }

    /// Append a filter to the end of the live chain
    pub fn add_filter(&self, filter: Arc<dyn Filter>) {
        self.shared.state.write().filters.push(filter);
    }

    pub fn add_hook(&self, hook: Arc<dyn Hook>) {
        self.shared.state.write().hooks.push(hook);
    }

    /// Dispatch a prepared entry and return every failure it met
    pub fn dispatch(&self, entry: LogEntry) -> Result<()> {
        self.shared.dispatch(entry)
    }

    /// Level a logger for `name` would be created with
    pub fn effective_level(&self, name: &str) -> LogLevel {
        component_state(&self.shared.state.read().config, name).level
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.read();
        f.debug_struct("Manager")
            .field("started", &state.started)
            .field("outputs", &state.outputs.keys().collect::<Vec<_>>())
            .field("filters", &state.filters)
            .field("hooks", &state.hooks.len())
            .field("loggers", &state.loggers.len())
            .finish()
    }
}
