use crate::common::{
    check_cancelled, run_cancellable, Atomic, Document, ObjectId, ReadExecutor, Value,
    WriteExecutor, DOC_ID,
};
use crate::errors::{duplicate_key_error, ErrorKind, RepoError, RepoResult};
use crate::store::{
    BulkWriteOptions, BulkWriteResult, DeleteResult, DocumentCollection, Filter,
    FindOneAndModifyOptions, FindOptions, ReturnDocument, UpdateDefinition, UpdateOptions,
    UpdateResult, WriteFailure, WriteModel,
};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

type DocumentMap = IndexMap<Value, Document>;

/// A collection of the embedded store.
///
/// Documents are kept in insertion order, keyed by `_id`. Replacing or updating a
/// document keeps its position. Every command takes the collection lock once and
/// never holds it across an `.await`, which makes single-document find-and-modify
/// commands atomic.
#[derive(Clone)]
pub struct EmbeddedCollection {
    inner: Arc<EmbeddedCollectionInner>,
}

struct EmbeddedCollectionInner {
    name: String,
    namespace: String,
    unique_fields: Vec<String>,
    latency: Option<Duration>,
    documents: Atomic<DocumentMap>,
}

impl EmbeddedCollection {
    pub(crate) fn new(
        database_name: &str,
        name: &str,
        unique_fields: Vec<String>,
        latency: Option<Duration>,
    ) -> Self {
        EmbeddedCollection {
            inner: Arc::new(EmbeddedCollectionInner {
                name: name.to_string(),
                namespace: format!("{}.{}", database_name, name),
                unique_fields,
                latency,
                documents: crate::common::atomic(IndexMap::new()),
            }),
        }
    }

    /// Waits for the simulated I/O round trip, honouring cancellation.
    async fn round_trip(&self, token: &CancellationToken, operation: &str) -> RepoResult<()> {
        check_cancelled(token, operation)?;
        if let Some(latency) = self.inner.latency {
            run_cancellable(token, operation, async {
                tokio::time::sleep(latency).await;
                Ok(())
            })
            .await?;
        }
        Ok(())
    }
}

impl EmbeddedCollectionInner {
    fn check_unique(
        &self,
        documents: &DocumentMap,
        candidate: &Document,
        replacing: Option<&Value>,
    ) -> RepoResult<()> {
        if let Some(id) = candidate.id() {
            if replacing != Some(id) && documents.contains_key(id) {
                return Err(duplicate_key_error(&self.namespace, DOC_ID, id));
            }
        }

        for field in &self.unique_fields {
            let value = candidate.get_or_null(field);
            // null and missing values are not indexed
            if value.is_null() {
                continue;
            }
            let conflict = documents.iter().any(|(key, existing)| {
                replacing != Some(key) && existing.get_or_null(field) == value
            });
            if conflict {
                return Err(duplicate_key_error(&self.namespace, field, &value));
            }
        }
        Ok(())
    }

    fn insert(&self, documents: &mut DocumentMap, mut document: Document) -> RepoResult<Value> {
        if !document.has_id() {
            document.put(DOC_ID, ObjectId::new())?;
        }
        self.check_unique(documents, &document, None)?;
        let id = document.get_or_null(DOC_ID);
        documents.insert(id.clone(), document);
        Ok(id)
    }

    fn matching_keys(
        &self,
        documents: &DocumentMap,
        filter: &Filter,
        first_only: bool,
    ) -> RepoResult<Vec<Value>> {
        let mut keys = Vec::new();
        for (key, document) in documents.iter() {
            if filter.apply(document)? {
                keys.push(key.clone());
                if first_only {
                    break;
                }
            }
        }
        Ok(keys)
    }

    /// Applies an update to the stored document under `key`; returns the before and
    /// after images.
    fn update_at(
        &self,
        documents: &mut DocumentMap,
        key: &Value,
        update: &UpdateDefinition,
    ) -> RepoResult<(Document, Document)> {
        let before = documents.get(key).cloned().ok_or_else(|| {
            RepoError::new("Matched document disappeared", ErrorKind::InternalError)
        })?;
        let mut after = before.clone();
        update.apply(&mut after, false)?;
        if after != before {
            self.check_unique(documents, &after, Some(key))?;
            documents.insert(key.clone(), after.clone());
        }
        Ok((before, after))
    }

    fn upsert_with_update(
        &self,
        documents: &mut DocumentMap,
        filter: &Filter,
        update: &UpdateDefinition,
    ) -> RepoResult<Document> {
        let mut document: Document = filter.equality_terms().into_iter().collect();
        update.apply(&mut document, true)?;
        let id = self.insert(documents, document)?;
        documents.get(&id).cloned().ok_or_else(|| {
            RepoError::new("Upserted document disappeared", ErrorKind::InternalError)
        })
    }

    fn replace_at(
        &self,
        documents: &mut DocumentMap,
        key: &Value,
        mut replacement: Document,
    ) -> RepoResult<(Document, Document)> {
        let before = documents.get(key).cloned().ok_or_else(|| {
            RepoError::new("Matched document disappeared", ErrorKind::InternalError)
        })?;
        match replacement.id() {
            None => replacement.put(DOC_ID, key.clone())?,
            Some(id) if id != key => {
                log::error!("Replacement would modify the immutable field _id");
                return Err(RepoError::new(
                    "After applying the update, the (immutable) field '_id' was found to have been altered",
                    ErrorKind::BackendError,
                ));
            }
            Some(_) => {}
        }
        if replacement != before {
            self.check_unique(documents, &replacement, Some(key))?;
            documents.insert(key.clone(), replacement.clone());
        }
        Ok((before, replacement))
    }

    fn upsert_with_replacement(
        &self,
        documents: &mut DocumentMap,
        filter: &Filter,
        mut replacement: Document,
    ) -> RepoResult<Document> {
        if !replacement.has_id() {
            if let Some((_, id)) = filter
                .equality_terms()
                .into_iter()
                .find(|(field, _)| field == DOC_ID)
            {
                replacement.put(DOC_ID, id)?;
            }
        }
        let id = self.insert(documents, replacement)?;
        documents.get(&id).cloned().ok_or_else(|| {
            RepoError::new("Upserted document disappeared", ErrorKind::InternalError)
        })
    }

    fn update(
        &self,
        documents: &mut DocumentMap,
        filter: &Filter,
        update: &UpdateDefinition,
        upsert: bool,
        first_only: bool,
    ) -> RepoResult<UpdateResult> {
        let keys = self.matching_keys(documents, filter, first_only)?;
        if keys.is_empty() {
            if upsert {
                let inserted = self.upsert_with_update(documents, filter, update)?;
                return Ok(UpdateResult {
                    matched_count: 0,
                    modified_count: 0,
                    upserted_id: inserted.id().cloned(),
                });
            }
            return Ok(UpdateResult::default());
        }

        let mut result = UpdateResult::default();
        for key in &keys {
            let (before, after) = self.update_at(documents, key, update)?;
            result.matched_count += 1;
            if before != after {
                result.modified_count += 1;
            }
        }
        Ok(result)
    }

    fn replace(
        &self,
        documents: &mut DocumentMap,
        filter: &Filter,
        replacement: Document,
        upsert: bool,
    ) -> RepoResult<UpdateResult> {
        let keys = self.matching_keys(documents, filter, true)?;
        match keys.first() {
            Some(key) => {
                let (before, after) = self.replace_at(documents, key, replacement)?;
                Ok(UpdateResult {
                    matched_count: 1,
                    modified_count: u64::from(before != after),
                    upserted_id: None,
                })
            }
            None if upsert => {
                let inserted = self.upsert_with_replacement(documents, filter, replacement)?;
                Ok(UpdateResult {
                    matched_count: 0,
                    modified_count: 0,
                    upserted_id: inserted.id().cloned(),
                })
            }
            None => Ok(UpdateResult::default()),
        }
    }

    fn delete(&self, documents: &mut DocumentMap, filter: &Filter, first_only: bool) -> RepoResult<u64> {
        let keys = self.matching_keys(documents, filter, first_only)?;
        for key in &keys {
            documents.shift_remove(key);
        }
        Ok(keys.len() as u64)
    }

    fn execute(
        &self,
        documents: &mut DocumentMap,
        index: usize,
        request: WriteModel,
        result: &mut BulkWriteResult,
    ) -> RepoResult<()> {
        match request {
            WriteModel::InsertOne { document } => {
                self.insert(documents, document)?;
                result.inserted_count += 1;
            }
            WriteModel::UpdateOne {
                filter,
                update,
                upsert,
            } => self.record_update(self.update(documents, &filter, &update, upsert, true)?, index, result),
            WriteModel::UpdateMany {
                filter,
                update,
                upsert,
            } => self.record_update(self.update(documents, &filter, &update, upsert, false)?, index, result),
            WriteModel::ReplaceOne {
                filter,
                replacement,
                upsert,
            } => self.record_update(self.replace(documents, &filter, replacement, upsert)?, index, result),
            WriteModel::DeleteOne { filter } => {
                result.deleted_count += self.delete(documents, &filter, true)?;
            }
            WriteModel::DeleteMany { filter } => {
                result.deleted_count += self.delete(documents, &filter, false)?;
            }
        }
        Ok(())
    }

    fn record_update(&self, outcome: UpdateResult, index: usize, result: &mut BulkWriteResult) {
        result.matched_count += outcome.matched_count;
        result.modified_count += outcome.modified_count;
        if let Some(id) = outcome.upserted_id {
            result.upserted_ids.insert(index, id);
        }
    }
}

fn sort_documents(documents: &mut [Document], options: &FindOptions) {
    if let Some((field, order)) = &options.sort_by {
        documents.sort_by(|a, b| order.apply(a.get_or_null(field).cmp(&b.get_or_null(field))));
    }
}

#[async_trait]
impl DocumentCollection for EmbeddedCollection {
    fn name(&self) -> &str {
        &self.inner.name
    }

    async fn insert_one(&self, document: Document, token: &CancellationToken) -> RepoResult<Value> {
        self.round_trip(token, "insert_one").await?;
        log::debug!("insert_one on {}", self.inner.namespace);
        self.inner
            .documents
            .write_with(|documents| self.inner.insert(documents, document))
    }

    async fn insert_many(
        &self,
        documents: Vec<Document>,
        token: &CancellationToken,
    ) -> RepoResult<Vec<Value>> {
        self.round_trip(token, "insert_many").await?;
        log::debug!("insert_many of {} documents on {}", documents.len(), self.inner.namespace);
        self.inner.documents.write_with(|stored| {
            documents
                .into_iter()
                .map(|document| self.inner.insert(stored, document))
                .collect()
        })
    }

    async fn count_documents(&self, filter: &Filter, token: &CancellationToken) -> RepoResult<u64> {
        self.round_trip(token, "count_documents").await?;
        self.inner.documents.read_with(|documents| -> RepoResult<u64> {
            let mut count = 0;
            for document in documents.values() {
                if filter.apply(document)? {
                    count += 1;
                }
            }
            Ok(count)
        })
    }

    async fn find(
        &self,
        filter: &Filter,
        options: &FindOptions,
        token: &CancellationToken,
    ) -> RepoResult<Vec<Document>> {
        self.round_trip(token, "find").await?;
        log::debug!("find on {} with filter {}", self.inner.namespace, filter);
        let mut matches = self.inner.documents.read_with(|documents| -> RepoResult<Vec<Document>> {
            let mut matches = Vec::new();
            for document in documents.values() {
                if filter.apply(document)? {
                    matches.push(document.clone());
                }
            }
            Ok(matches)
        })?;

        sort_documents(&mut matches, options);
        let skip = options.skip.unwrap_or(0) as usize;
        let limit = options.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(matches.into_iter().skip(skip).take(limit).collect())
    }

    async fn find_one_and_delete(
        &self,
        filter: &Filter,
        token: &CancellationToken,
    ) -> RepoResult<Option<Document>> {
        self.round_trip(token, "find_one_and_delete").await?;
        self.inner.documents.write_with(|documents| -> RepoResult<Option<Document>> {
            let keys = self.inner.matching_keys(documents, filter, true)?;
            Ok(keys.first().and_then(|key| documents.shift_remove(key)))
        })
    }

    async fn find_one_and_update(
        &self,
        filter: &Filter,
        update: &UpdateDefinition,
        options: &FindOneAndModifyOptions,
        token: &CancellationToken,
    ) -> RepoResult<Option<Document>> {
        self.round_trip(token, "find_one_and_update").await?;
        log::debug!(
            "find_one_and_update on {} with filter {} and update {}",
            self.inner.namespace,
            filter,
            update
        );
        self.inner.documents.write_with(|documents| -> RepoResult<Option<Document>> {
            let keys = self.inner.matching_keys(documents, filter, true)?;
            match keys.first() {
                Some(key) => {
                    let (before, after) = self.inner.update_at(documents, key, update)?;
                    Ok(Some(match options.return_document() {
                        ReturnDocument::Before => before,
                        ReturnDocument::After => after,
                    }))
                }
                None if options.is_upsert() => {
                    let inserted = self.inner.upsert_with_update(documents, filter, update)?;
                    Ok(match options.return_document() {
                        ReturnDocument::Before => None,
                        ReturnDocument::After => Some(inserted),
                    })
                }
                None => Ok(None),
            }
        })
    }

    async fn find_one_and_replace(
        &self,
        filter: &Filter,
        replacement: Document,
        options: &FindOneAndModifyOptions,
        token: &CancellationToken,
    ) -> RepoResult<Option<Document>> {
        self.round_trip(token, "find_one_and_replace").await?;
        self.inner.documents.write_with(|documents| -> RepoResult<Option<Document>> {
            let keys = self.inner.matching_keys(documents, filter, true)?;
            match keys.first() {
                Some(key) => {
                    let (before, after) = self.inner.replace_at(documents, key, replacement)?;
                    Ok(Some(match options.return_document() {
                        ReturnDocument::Before => before,
                        ReturnDocument::After => after,
                    }))
                }
                None if options.is_upsert() => {
                    let inserted =
                        self.inner
                            .upsert_with_replacement(documents, filter, replacement)?;
                    Ok(match options.return_document() {
                        ReturnDocument::Before => None,
                        ReturnDocument::After => Some(inserted),
                    })
                }
                None => Ok(None),
            }
        })
    }

    async fn update_one(
        &self,
        filter: &Filter,
        update: &UpdateDefinition,
        options: &UpdateOptions,
        token: &CancellationToken,
    ) -> RepoResult<UpdateResult> {
        self.round_trip(token, "update_one").await?;
        log::debug!("update_one on {} with filter {} and update {}", self.inner.namespace, filter, update);
        self.inner.documents.write_with(|documents| {
            self.inner
                .update(documents, filter, update, options.is_upsert(), true)
        })
    }

    async fn update_many(
        &self,
        filter: &Filter,
        update: &UpdateDefinition,
        options: &UpdateOptions,
        token: &CancellationToken,
    ) -> RepoResult<UpdateResult> {
        self.round_trip(token, "update_many").await?;
        log::debug!("update_many on {} with filter {} and update {}", self.inner.namespace, filter, update);
        self.inner.documents.write_with(|documents| {
            self.inner
                .update(documents, filter, update, options.is_upsert(), false)
        })
    }

    async fn replace_one(
        &self,
        filter: &Filter,
        replacement: Document,
        options: &UpdateOptions,
        token: &CancellationToken,
    ) -> RepoResult<UpdateResult> {
        self.round_trip(token, "replace_one").await?;
        self.inner.documents.write_with(|documents| {
            self.inner
                .replace(documents, filter, replacement, options.is_upsert())
        })
    }

    async fn delete_one(&self, filter: &Filter, token: &CancellationToken) -> RepoResult<DeleteResult> {
        self.round_trip(token, "delete_one").await?;
        let deleted_count = self
            .inner
            .documents
            .write_with(|documents| self.inner.delete(documents, filter, true))?;
        Ok(DeleteResult { deleted_count })
    }

    async fn delete_many(&self, filter: &Filter, token: &CancellationToken) -> RepoResult<DeleteResult> {
        self.round_trip(token, "delete_many").await?;
        log::debug!("delete_many on {} with filter {}", self.inner.namespace, filter);
        let deleted_count = self
            .inner
            .documents
            .write_with(|documents| self.inner.delete(documents, filter, false))?;
        Ok(DeleteResult { deleted_count })
    }

    async fn bulk_write(
        &self,
        requests: Vec<WriteModel>,
        options: &BulkWriteOptions,
        token: &CancellationToken,
    ) -> RepoResult<BulkWriteResult> {
        self.round_trip(token, "bulk_write").await?;
        log::debug!(
            "bulk_write of {} requests on {} (ordered: {})",
            requests.len(),
            self.inner.namespace,
            options.is_ordered()
        );
        let result = self.inner.documents.write_with(|documents| {
            let mut result = BulkWriteResult::default();
            for (index, request) in requests.into_iter().enumerate() {
                if let Err(error) = self.inner.execute(documents, index, request, &mut result) {
                    result.write_errors.push(WriteFailure { index, error });
                    if options.is_ordered() {
                        break;
                    }
                }
            }
            result
        });
        Ok(result)
    }
}
