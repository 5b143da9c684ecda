//! Built-in outputs
//!
//! Each module exposes a `factory()` registered by the manager on start
//! under the module's type name.

pub mod buffered;
pub mod console;
pub mod file;
pub mod multi;
pub mod rotating_file;
pub mod syslog;

#[cfg(test)]
pub(crate) mod testing;

pub use buffered::BufferedOutput;
pub use console::ConsoleOutput;
pub use file::FileOutput;
pub use multi::MultiOutput;
pub use rotating_file::{RotatingWriter, RotationSettings};
pub use syslog::{SyslogOutput, SyslogTarget};

use crate::core::registry::{OutputFactory, Registry};

/// Register the built-in output types without replacing existing ones
pub fn register_builtins(registry: &mut Registry<OutputFactory>) {
    registry.register_default("console", console::factory());
    registry.register_default("file", file::factory());
    registry.register_default("syslog", syslog::factory());
    registry.register_default("buffered", buffered::factory());
    registry.register_default("multi", multi::factory());
}
