use crate::common::{Document, Value};
use crate::errors::RepoError;
use crate::store::{Filter, UpdateDefinition};
use std::collections::BTreeMap;

/// Outcome of an update or replace command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    pub matched_count: u64,
    /// Documents whose stored representation actually changed.
    pub modified_count: u64,
    /// Identifier of the document created by an upsert.
    pub upserted_id: Option<Value>,
}

/// Outcome of a delete command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

/// One request of a bulk write.
#[derive(Debug, Clone)]
pub enum WriteModel {
    InsertOne {
        document: Document,
    },
    UpdateOne {
        filter: Filter,
        update: UpdateDefinition,
        upsert: bool,
    },
    UpdateMany {
        filter: Filter,
        update: UpdateDefinition,
        upsert: bool,
    },
    ReplaceOne {
        filter: Filter,
        replacement: Document,
        upsert: bool,
    },
    DeleteOne {
        filter: Filter,
    },
    DeleteMany {
        filter: Filter,
    },
}

/// A failed request of a bulk write.
#[derive(Debug, Clone)]
pub struct WriteFailure {
    /// Position of the failed request in the batch.
    pub index: usize,
    pub error: RepoError,
}

/// Aggregate outcome of a bulk write.
#[derive(Debug, Clone, Default)]
pub struct BulkWriteResult {
    pub inserted_count: u64,
    pub matched_count: u64,
    pub modified_count: u64,
    pub deleted_count: u64,
    /// Identifiers of upserted documents keyed by request position.
    pub upserted_ids: BTreeMap<usize, Value>,
    pub write_errors: Vec<WriteFailure>,
}

impl BulkWriteResult {
    pub fn upserted_count(&self) -> u64 {
        self.upserted_ids.len() as u64
    }

    pub fn has_errors(&self) -> bool {
        !self.write_errors.is_empty()
    }
}
