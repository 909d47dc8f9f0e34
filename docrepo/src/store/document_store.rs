use crate::common::{Document, Value};
use crate::errors::RepoResult;
use crate::store::{
    BulkWriteOptions, BulkWriteResult, DeleteResult, Filter, FindOneAndModifyOptions, FindOptions,
    UpdateDefinition, UpdateOptions, UpdateResult, WriteModel,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A document database connection: the source of named collections.
pub trait DocumentStore: Send + Sync {
    fn database_name(&self) -> &str;

    /// Returns the collection with the given name, creating it on first use.
    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection>;

    /// Names of the collections created so far, with the configured prefix.
    fn collection_names(&self) -> Vec<String>;
}

/// Commands of one document collection.
///
/// Every command is asynchronous and takes a cancellation token. A command whose
/// token fires before or while it waits on I/O fails with
/// [crate::errors::ErrorKind::Cancelled]. Single-document find-and-modify commands
/// are atomic. Uniqueness violations fail with an error whose cause carries
/// [crate::errors::DUPLICATE_KEY_MARKER].
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    /// Full collection name, including the configured prefix.
    fn name(&self) -> &str;

    /// Inserts a document and returns its identifier.
    async fn insert_one(&self, document: Document, token: &CancellationToken) -> RepoResult<Value>;

    /// Inserts documents in order, stopping at the first failure.
    async fn insert_many(
        &self,
        documents: Vec<Document>,
        token: &CancellationToken,
    ) -> RepoResult<Vec<Value>>;

    async fn count_documents(&self, filter: &Filter, token: &CancellationToken) -> RepoResult<u64>;

    async fn find(
        &self,
        filter: &Filter,
        options: &FindOptions,
        token: &CancellationToken,
    ) -> RepoResult<Vec<Document>>;

    async fn find_one_and_delete(
        &self,
        filter: &Filter,
        token: &CancellationToken,
    ) -> RepoResult<Option<Document>>;

    async fn find_one_and_update(
        &self,
        filter: &Filter,
        update: &UpdateDefinition,
        options: &FindOneAndModifyOptions,
        token: &CancellationToken,
    ) -> RepoResult<Option<Document>>;

    async fn find_one_and_replace(
        &self,
        filter: &Filter,
        replacement: Document,
        options: &FindOneAndModifyOptions,
        token: &CancellationToken,
    ) -> RepoResult<Option<Document>>;

    async fn update_one(
        &self,
        filter: &Filter,
        update: &UpdateDefinition,
        options: &UpdateOptions,
        token: &CancellationToken,
    ) -> RepoResult<UpdateResult>;

    async fn update_many(
        &self,
        filter: &Filter,
        update: &UpdateDefinition,
        options: &UpdateOptions,
        token: &CancellationToken,
    ) -> RepoResult<UpdateResult>;

    async fn replace_one(
        &self,
        filter: &Filter,
        replacement: Document,
        options: &UpdateOptions,
        token: &CancellationToken,
    ) -> RepoResult<UpdateResult>;

    async fn delete_one(&self, filter: &Filter, token: &CancellationToken) -> RepoResult<DeleteResult>;

    async fn delete_many(&self, filter: &Filter, token: &CancellationToken) -> RepoResult<DeleteResult>;

    /// Executes a batch of write requests.
    ///
    /// Request failures are reported in [BulkWriteResult::write_errors]; an ordered
    /// batch stops at the first one, an unordered batch runs every request.
    async fn bulk_write(
        &self,
        requests: Vec<WriteModel>,
        options: &BulkWriteOptions,
        token: &CancellationToken,
    ) -> RepoResult<BulkWriteResult>;
}
