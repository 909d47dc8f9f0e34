use crate::common::SortOrder;

/// Which image of a document a find-and-modify command returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnDocument {
    /// The document as it was before the modification.
    #[default]
    Before,
    /// The document as it is after the modification.
    After,
}

/// Options of a find command.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub(crate) sort_by: Option<(String, SortOrder)>,
    pub(crate) skip: Option<u64>,
    pub(crate) limit: Option<u64>,
}

impl FindOptions {
    pub fn new() -> FindOptions {
        FindOptions::default()
    }

    pub fn skip(mut self, skip: u64) -> FindOptions {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: u64) -> FindOptions {
        self.limit = Some(limit);
        self
    }

    pub fn sort_by(mut self, field_name: &str, sort_order: SortOrder) -> FindOptions {
        self.sort_by = Some((field_name.to_string(), sort_order));
        self
    }
}

/// Creates [FindOptions] sorting by a single field.
pub fn order_by(field_name: &str, sort_order: SortOrder) -> FindOptions {
    FindOptions::new().sort_by(field_name, sort_order)
}

/// Options of an update or replace command.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    upsert: bool,
}

impl UpdateOptions {
    pub fn new(upsert: bool) -> Self {
        UpdateOptions { upsert }
    }

    pub fn is_upsert(&self) -> bool {
        self.upsert
    }
}

/// Update options that insert a document when nothing matches.
pub fn upsert() -> UpdateOptions {
    UpdateOptions::new(true)
}

/// Options of the find-one-and-update and find-one-and-replace commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct FindOneAndModifyOptions {
    return_document: ReturnDocument,
    upsert: bool,
}

impl FindOneAndModifyOptions {
    pub fn new(return_document: ReturnDocument, upsert: bool) -> Self {
        FindOneAndModifyOptions {
            return_document,
            upsert,
        }
    }

    pub fn return_document(&self) -> ReturnDocument {
        self.return_document
    }

    pub fn is_upsert(&self) -> bool {
        self.upsert
    }
}

/// Options of a bulk write.
#[derive(Debug, Clone, Copy)]
pub struct BulkWriteOptions {
    ordered: bool,
}

impl BulkWriteOptions {
    pub fn new(ordered: bool) -> Self {
        BulkWriteOptions { ordered }
    }

    /// An ordered batch stops at the first failed request; an unordered batch
    /// executes every request regardless of failures.
    pub fn is_ordered(&self) -> bool {
        self.ordered
    }
}

impl Default for BulkWriteOptions {
    fn default() -> Self {
        BulkWriteOptions { ordered: true }
    }
}

/// Bulk write options that execute every request even when some fail.
pub fn unordered() -> BulkWriteOptions {
    BulkWriteOptions::new(false)
}
