//! Hook trait for best-effort side effects

use super::error::Result;
use super::log_entry::LogEntry;
use super::log_level::LogLevel;

/// A side-effect handler fired for entries at matching levels
///
/// Hooks run after the filter chain and before the outputs. Their failures
/// are recorded but never affect dispatch.
pub trait Hook: Send + Sync {
    fn fire(&self, entry: &LogEntry) -> Result<()>;

    fn name(&self) -> &str;

    /// Levels this hook handles; empty means every level
    fn levels(&self) -> &[LogLevel];

    fn handles(&self, level: LogLevel) -> bool {
        let levels = self.levels();
        levels.is_empty() || levels.contains(&level)
    }
}
