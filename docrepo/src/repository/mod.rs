//! Typed repositories.
//!
//! [RepositoryProvider] is the data-access contract for one entity type and
//! [Repository] its facade. Two backends implement it with the same predicate and
//! update semantics:
//! - [LiveRepository] runs every operation as document store commands.
//! - [MemoryRepository] keeps entities in an in-process list, for fast
//!   deterministic tests.
//!
//! Paging validation and error mapping shared by both live in free functions such
//! as [to_skip].

mod live_repository;
mod memory_repository;
#[allow(clippy::module_inception)]
mod repository;
mod repository_operations;

pub use live_repository::*;
pub use memory_repository::*;
pub use repository::*;
pub use repository_operations::*;
