//! Built-in filters

pub mod component;
pub mod field;
pub mod level;
pub mod sampling;

pub use component::ComponentFilter;
pub use field::{FieldAction, FieldFilter, Operator};
pub use level::LevelFilter;
pub use sampling::{SamplingFilter, SamplingSettings};

use crate::core::registry::{FilterFactory, Registry};

/// Register the built-in filter types without replacing existing ones
pub fn register_builtins(registry: &mut Registry<FilterFactory>) {
    registry.register_default("level", level::factory());
    registry.register_default("sampling", sampling::factory());
    registry.register_default("component", component::factory());
    registry.register_default("field", field::factory());
}
