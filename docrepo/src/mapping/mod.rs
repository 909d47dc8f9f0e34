//! Field and identity resolution for entity types.
//!
//! An [Entity] describes itself once through an [EntityMapping]: which member is
//! the identifier and which members are persisted, each with a typed getter and
//! setter. [resolve] memoizes the mapping per type for the lifetime of the process.

mod entity;
mod entity_mapping;
mod field_accessor;
mod registry;

pub use entity::*;
pub use entity_mapping::*;
pub use field_accessor::*;
pub use registry::*;
