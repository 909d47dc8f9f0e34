// document constants
pub const DOC_ID: &str = "_id";

// store constants
pub const DEFAULT_DATABASE_NAME: &str = "docrepo";
pub const MEMORY_DATABASE_NAME: &str = "memory";

// index constants
pub const UNIQUE_INDEX_SUFFIX: &str = "_1";

// object id constants
pub const OBJECT_ID_LENGTH: usize = 12;
