//! Built-in hooks

pub mod audit;
pub mod callback;

pub use audit::AuditHook;
pub use callback::CallbackHook;

use crate::core::registry::{HookFactory, Registry};

/// Register the built-in hook types without replacing existing ones
pub fn register_builtins(registry: &mut Registry<HookFactory>) {
    registry.register_default("audit", audit::factory());
}
