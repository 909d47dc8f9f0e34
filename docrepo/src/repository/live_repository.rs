use crate::common::{check_cancelled, Document, DOC_ID};
use crate::errors::{ErrorKind, RepoResult};
use crate::mapping::{resolve, Entity, EntityMapping};
use crate::predicate::{FilterTranslator, Predicate};
use crate::repository::{
    batch_result, map_write_error, require_updates, to_skip, OrderBy, RepositoryProvider,
    UpsertOutcome,
};
use crate::store::{
    unordered, DocumentCollection, DocumentStore, Filter, FindOneAndModifyOptions, FindOptions,
    ReturnDocument, UpdateDefinition, UpdateOperation, UpdateOptions, UpdateResult, WriteModel,
};
use crate::update::Updates;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A repository backed by a document store collection.
///
/// Predicates are normalized and translated into store filters, update
/// descriptors into store update definitions, and entities into documents through
/// the entity mapping. Uniqueness violations reported by the store surface as
/// [ErrorKind::DuplicateKey]; every other store failure propagates unchanged.
///
/// # Examples
///
/// ```rust,ignore
/// let store = EmbeddedStore::connect(config, &token).await?;
/// let posts: LiveRepository<Post> = LiveRepository::new(&store)?;
/// posts.insert_one(&post, &token).await?;
/// ```
pub struct LiveRepository<T: Entity> {
    inner: Arc<LiveRepositoryInner<T>>,
}

struct LiveRepositoryInner<T> {
    collection: Arc<dyn DocumentCollection>,
    mapping: Arc<EntityMapping<T>>,
}

impl<T: Entity> LiveRepository<T> {
    /// Opens the repository on the store collection named after
    /// [Entity::collection_name].
    ///
    /// # Errors
    ///
    /// Fails when the mapping of `T` cannot be resolved.
    pub fn new(store: &dyn DocumentStore) -> RepoResult<Self> {
        let collection = store.collection(&T::collection_name());
        LiveRepository::with_collection(collection)
    }

    /// Opens the repository on an explicit collection.
    pub fn with_collection(collection: Arc<dyn DocumentCollection>) -> RepoResult<Self> {
        let mapping = resolve::<T>()?;
        log::debug!(
            "Opened live repository for {} on collection {}",
            mapping.type_name(),
            collection.name()
        );
        Ok(LiveRepository {
            inner: Arc::new(LiveRepositoryInner { collection, mapping }),
        })
    }

    pub fn collection(&self) -> &Arc<dyn DocumentCollection> {
        &self.inner.collection
    }
}

impl<T: Entity> Clone for LiveRepository<T> {
    fn clone(&self) -> Self {
        LiveRepository {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Entity> LiveRepositoryInner<T> {
    fn filter(&self, predicate: Option<&Predicate<T>>) -> RepoResult<Filter> {
        let filter = match predicate {
            None => Filter::All,
            Some(predicate) => {
                FilterTranslator::new(&self.mapping).translate(&predicate.normalized())?
            }
        };
        log::debug!("Translated filter on {}: {}", self.collection.name(), filter);
        Ok(filter)
    }

    fn id_filter(&self, entity: &T) -> RepoResult<Filter> {
        Ok(Filter::Eq(DOC_ID.to_string(), self.mapping.id_value(entity)?))
    }

    fn to_document(&self, entity: &T) -> RepoResult<Document> {
        self.mapping.to_document(entity)
    }

    fn from_document(&self, document: Option<Document>) -> RepoResult<Option<T>> {
        document
            .map(|document| self.mapping.from_document(&document))
            .transpose()
    }

    fn from_documents(&self, documents: Vec<Document>) -> RepoResult<Vec<T>> {
        documents
            .iter()
            .map(|document| self.mapping.from_document(document))
            .collect()
    }

    fn entity_updates(&self, entities: &[T], upsert: bool) -> RepoResult<Vec<WriteModel>> {
        entities
            .iter()
            .map(|entity| -> RepoResult<WriteModel> {
                let update = Updates::new()
                    .set_all_mapped(entity, &[])?
                    .to_definition(&self.mapping)?;
                Ok(WriteModel::UpdateOne {
                    filter: self.id_filter(entity)?,
                    update,
                    upsert,
                })
            })
            .collect()
    }

    async fn bulk_update_entities(
        &self,
        operation: &str,
        entities: &[T],
        upsert: bool,
        token: &CancellationToken,
    ) -> RepoResult<u64> {
        check_cancelled(token, operation)?;
        if entities.is_empty() {
            return Ok(0);
        }
        let requests = self.entity_updates(entities, upsert)?;
        log::debug!("{} submits {} request(s) to {}", operation, requests.len(), self.collection.name());
        let result = self.collection.bulk_write(requests, &unordered(), token).await?;
        let count = result.upserted_count() + result.modified_count;
        batch_result(operation, count, result.write_errors)
    }

    /// Adds a `SetOnInsert` of the default value for every mapped member that a
    /// document created by an upsert would otherwise lack.
    ///
    /// Members seeded from the filter's equality terms or written by a set,
    /// increment, set-on-insert or push keep their value. A pulled member gets its
    /// default after the pull, which is what pulling from the default yields.
    fn with_insert_defaults(
        &self,
        filter: &Filter,
        mut definition: UpdateDefinition,
    ) -> RepoResult<UpdateDefinition> {
        let mut covered: HashSet<String> = filter
            .equality_terms()
            .into_iter()
            .map(|(field, _)| field)
            .collect();
        for operation in definition.operations() {
            if !matches!(operation, UpdateOperation::Pull(..)) {
                covered.insert(operation.field().to_string());
            }
        }

        let defaults = T::default();
        for accessor in self.mapping.fields() {
            if accessor.is_id() || covered.contains(accessor.element_name()) {
                continue;
            }
            definition = definition.add(UpdateOperation::SetOnInsert(
                accessor.element_name().to_string(),
                accessor.get(&defaults)?,
            ));
        }
        Ok(definition)
    }

    async fn update(
        &self,
        predicate: &Predicate<T>,
        updates: &Updates<T>,
        upsert: bool,
        many: bool,
        token: &CancellationToken,
    ) -> RepoResult<UpdateResult> {
        let operation = if many { "update_many" } else { "update_one" };
        require_updates(updates)?;
        let filter = self.filter(Some(predicate))?;
        let mut definition = updates.to_definition(&self.mapping)?;
        if upsert {
            definition = self.with_insert_defaults(&filter, definition)?;
        }
        log::debug!("{} on {} with {}", operation, self.collection.name(), definition);
        let options = UpdateOptions::new(upsert);
        let result = if many {
            self.collection
                .update_many(&filter, &definition, &options, token)
                .await
        } else {
            self.collection
                .update_one(&filter, &definition, &options, token)
                .await
        };
        result.map_err(|err| map_write_error(operation, err))
    }
}

#[async_trait]
impl<T: Entity> RepositoryProvider<T> for LiveRepository<T> {
    async fn insert_one(&self, entity: &T, token: &CancellationToken) -> RepoResult<()> {
        let document = self.inner.to_document(entity)?;
        self.inner
            .collection
            .insert_one(document, token)
            .await
            .map_err(|err| map_write_error("insert_one", err))?;
        Ok(())
    }

    async fn insert_many(&self, entities: &[T], token: &CancellationToken) -> RepoResult<()> {
        check_cancelled(token, "insert_many")?;
        if entities.is_empty() {
            return Ok(());
        }
        let documents = entities
            .iter()
            .map(|entity| self.inner.to_document(entity))
            .collect::<RepoResult<Vec<_>>>()?;
        self.inner
            .collection
            .insert_many(documents, token)
            .await
            .map_err(|err| map_write_error("insert_many", err))?;
        Ok(())
    }

    async fn insert_one_handle_duplicate(&self, entity: &T, token: &CancellationToken) -> RepoResult<bool> {
        match self.insert_one(entity, token).await {
            Ok(()) => Ok(false),
            Err(err) if err.is_duplicate_key() => {
                log::warn!(
                    "Skipped duplicate {} in {}: {:?}",
                    self.inner.mapping.type_name(),
                    self.inner.collection.name(),
                    err.chain().last().map(|cause| cause.message())
                );
                Ok(true)
            }
            Err(err) => Err(err),
        }
    }

    async fn count_documents(
        &self,
        predicate: Option<&Predicate<T>>,
        token: &CancellationToken,
    ) -> RepoResult<u64> {
        let filter = self.inner.filter(predicate)?;
        self.inner.collection.count_documents(&filter, token).await
    }

    async fn find_one(&self, predicate: &Predicate<T>, token: &CancellationToken) -> RepoResult<Option<T>> {
        let filter = self.inner.filter(Some(predicate))?;
        let documents = self
            .inner
            .collection
            .find(&filter, &FindOptions::new().limit(1), token)
            .await?;
        self.inner.from_document(documents.into_iter().next())
    }

    async fn find_all(
        &self,
        predicate: Option<&Predicate<T>>,
        token: &CancellationToken,
    ) -> RepoResult<Vec<T>> {
        let filter = self.inner.filter(predicate)?;
        let documents = self
            .inner
            .collection
            .find(&filter, &FindOptions::new(), token)
            .await?;
        self.inner.from_documents(documents)
    }

    async fn find_many(
        &self,
        predicate: &Predicate<T>,
        page_index: i64,
        page_size: i64,
        order_by: Option<&OrderBy>,
        token: &CancellationToken,
    ) -> RepoResult<Vec<T>> {
        let skip = to_skip(page_index, page_size)?;
        let filter = self.inner.filter(Some(predicate))?;
        let mut options = FindOptions::new().skip(skip).limit(page_size as u64);
        if let Some(order_by) = order_by {
            let accessor = self
                .inner
                .mapping
                .require_field(order_by.field(), ErrorKind::FilterError)?;
            options = options.sort_by(accessor.element_name(), order_by.order());
        }
        let documents = self.inner.collection.find(&filter, &options, token).await?;
        self.inner.from_documents(documents)
    }

    async fn find_one_and_delete(
        &self,
        predicate: &Predicate<T>,
        token: &CancellationToken,
    ) -> RepoResult<Option<T>> {
        let filter = self.inner.filter(Some(predicate))?;
        let removed = self
            .inner
            .collection
            .find_one_and_delete(&filter, token)
            .await?;
        self.inner.from_document(removed)
    }

    async fn find_one_and_update(
        &self,
        predicate: &Predicate<T>,
        updates: &Updates<T>,
        return_document: ReturnDocument,
        token: &CancellationToken,
    ) -> RepoResult<Option<T>> {
        require_updates(updates)?;
        let filter = self.inner.filter(Some(predicate))?;
        let definition = updates.to_definition(&self.inner.mapping)?;
        let options = FindOneAndModifyOptions::new(return_document, false);
        let document = self
            .inner
            .collection
            .find_one_and_update(&filter, &definition, &options, token)
            .await
            .map_err(|err| map_write_error("find_one_and_update", err))?;
        self.inner.from_document(document)
    }

    async fn find_one_and_replace(
        &self,
        entity: &T,
        is_upsert: bool,
        return_document: ReturnDocument,
        token: &CancellationToken,
    ) -> RepoResult<Option<T>> {
        let filter = self.inner.id_filter(entity)?;
        let replacement = self.inner.to_document(entity)?;
        let options = FindOneAndModifyOptions::new(return_document, is_upsert);
        let document = self
            .inner
            .collection
            .find_one_and_replace(&filter, replacement, &options, token)
            .await
            .map_err(|err| map_write_error("find_one_and_replace", err))?;
        self.inner.from_document(document)
    }

    async fn update_one(
        &self,
        predicate: &Predicate<T>,
        updates: &Updates<T>,
        token: &CancellationToken,
    ) -> RepoResult<u64> {
        let result = self.inner.update(predicate, updates, false, false, token).await?;
        Ok(result.modified_count)
    }

    async fn update_many(
        &self,
        predicate: &Predicate<T>,
        updates: &Updates<T>,
        token: &CancellationToken,
    ) -> RepoResult<u64> {
        let result = self.inner.update(predicate, updates, false, true, token).await?;
        Ok(result.modified_count)
    }

    async fn upsert_one(
        &self,
        predicate: &Predicate<T>,
        updates: &Updates<T>,
        token: &CancellationToken,
    ) -> RepoResult<UpsertOutcome> {
        let result = self.inner.update(predicate, updates, true, false, token).await?;
        Ok(UpsertOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn update_entity(&self, entity: &T, token: &CancellationToken) -> RepoResult<u64> {
        let filter = self.inner.id_filter(entity)?;
        let definition = Updates::new()
            .set_all_mapped(entity, &[])?
            .to_definition(&self.inner.mapping)?;
        let result = self
            .inner
            .collection
            .update_one(&filter, &definition, &UpdateOptions::new(false), token)
            .await
            .map_err(|err| map_write_error("update_entity", err))?;
        Ok(result.modified_count)
    }

    async fn update_entities(&self, entities: &[T], token: &CancellationToken) -> RepoResult<u64> {
        self.inner
            .bulk_update_entities("update_entities", entities, false, token)
            .await
    }

    async fn upsert_entities(&self, entities: &[T], token: &CancellationToken) -> RepoResult<u64> {
        self.inner
            .bulk_update_entities("upsert_entities", entities, true, token)
            .await
    }

    async fn delete_one(&self, predicate: &Predicate<T>, token: &CancellationToken) -> RepoResult<u64> {
        let filter = self.inner.filter(Some(predicate))?;
        let result = self.inner.collection.delete_one(&filter, token).await?;
        Ok(result.deleted_count)
    }

    async fn delete_many(&self, predicate: &Predicate<T>, token: &CancellationToken) -> RepoResult<u64> {
        let filter = self.inner.filter(Some(predicate))?;
        let result = self.inner.collection.delete_many(&filter, token).await?;
        Ok(result.deleted_count)
    }

    async fn replace_one(&self, entity: &T, is_upsert: bool, token: &CancellationToken) -> RepoResult<u64> {
        let filter = self.inner.id_filter(entity)?;
        let replacement = self.inner.to_document(entity)?;
        let result = self
            .inner
            .collection
            .replace_one(&filter, replacement, &UpdateOptions::new(is_upsert), token)
            .await
            .map_err(|err| map_write_error("replace_one", err))?;
        Ok(result.modified_count)
    }

    async fn replace_many(&self, entities: &[T], is_upsert: bool, token: &CancellationToken) -> RepoResult<u64> {
        check_cancelled(token, "replace_many")?;
        if entities.is_empty() {
            return Ok(0);
        }
        let requests = entities
            .iter()
            .map(|entity| -> RepoResult<WriteModel> {
                Ok(WriteModel::ReplaceOne {
                    filter: self.inner.id_filter(entity)?,
                    replacement: self.inner.to_document(entity)?,
                    upsert: is_upsert,
                })
            })
            .collect::<RepoResult<Vec<_>>>()?;
        log::debug!(
            "replace_many submits {} request(s) to {}",
            requests.len(),
            self.inner.collection.name()
        );
        let result = self
            .inner
            .collection
            .bulk_write(requests, &unordered(), token)
            .await?;
        let count = result.upserted_count() + result.modified_count;
        batch_result("replace_many", count, result.write_errors)
    }
}
