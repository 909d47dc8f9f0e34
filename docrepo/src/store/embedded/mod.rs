mod embedded_collection;
mod embedded_store;

pub use embedded_collection::*;
pub use embedded_store::*;
