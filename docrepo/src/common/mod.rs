mod constants;
mod convertible;
mod document;
mod object_id;
mod sort_order;
mod text_pattern;
pub mod util;
mod value;

pub use constants::*;
pub use convertible::*;
pub use document::*;
pub use object_id::*;
pub use sort_order::*;
pub use text_pattern::*;
pub use util::*;
pub use value::*;
