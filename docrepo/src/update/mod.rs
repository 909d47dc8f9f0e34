//! Backend-independent update descriptors.
//!
//! [Updates] collects set, increment, set-on-insert, push and pull intents. The
//! live repository translates it into a store update definition; the in-memory
//! repository applies it to entities through their field accessors.

mod updates;

pub use updates::*;
