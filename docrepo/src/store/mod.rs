//! The document-database client layer the live repository runs on.
//!
//! [DocumentStore] and [DocumentCollection] are the commands a repository needs
//! from a document database. [EmbeddedStore] implements them in process.

mod config;
mod document_store;
mod embedded;
mod filter;
mod options;
mod results;
mod update_definition;

pub use config::*;
pub use document_store::*;
pub use embedded::*;
pub use filter::*;
pub use options::*;
pub use results::*;
pub use update_definition::*;
