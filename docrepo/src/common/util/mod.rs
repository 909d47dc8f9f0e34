mod cancel_utils;
mod type_utils;
mod value_utils;

pub use cancel_utils::*;
pub use type_utils::*;
pub use value_utils::*;
