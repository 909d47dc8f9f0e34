//! Typed predicates over entities.
//!
//! A [Predicate] is an expression tree over the mapped members of an entity type.
//! Predicates are created with the fluent API:
//! - `field("counter").gt(3)` - comparison operators
//! - `field("text").eq("hello")` - equality checks
//! - `id().eq(post_id)` - identifier match
//! - `value_equals(field("owner"), constant(owner))` - helper equality
//! - `all()` - match every entity
//!
//! The in-memory repository runs predicates with [PredicateEvaluator]. The live
//! repository rewrites helper calls with [EqualityNormalizer] and compiles the
//! result into a store filter with [FilterTranslator].

mod evaluator;
mod expr;
mod normalizer;
#[allow(clippy::module_inception)]
mod predicate;
mod translator;

pub use evaluator::*;
pub use expr::*;
pub use normalizer::*;
pub use predicate::*;
pub use translator::*;
