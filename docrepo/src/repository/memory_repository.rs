use crate::common::{
    atomic, check_cancelled, Atomic, Document, ObjectId, ReadExecutor, Value, WriteExecutor,
    MEMORY_DATABASE_NAME,
};
use crate::errors::{duplicate_key_error, ErrorKind, RepoResult};
use crate::mapping::{resolve, Entity, EntityMapping};
use crate::predicate::{FilterTranslator, Predicate, PredicateEvaluator};
use crate::repository::{
    batch_result, map_write_error, require_updates, to_skip, OrderBy, RepositoryProvider,
    UpsertOutcome,
};
use crate::store::{ReturnDocument, WriteFailure};
use crate::update::Updates;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A repository over an ordered list of entities held in process memory.
///
/// Predicates are evaluated directly against each entity and update descriptors
/// are applied through the entity's field accessors, with the same semantics the
/// live repository gets from its store. The identifier is always unique; members
/// declared with [MemoryRepository::with_unique_fields] are unique as well, with
/// null values not indexed.
///
/// Entities are kept in their stored form: each written entity is converted to a
/// document and back, so members lose what their stored value cannot hold (a
/// duration keeps whole milliseconds), exactly as on the live store.
///
/// Every operation checks its cancellation token once, before it starts; a scan
/// is never interrupted half way.
///
/// Each operation runs under one lock acquisition, so a single find-and-modify is
/// atomic. Operations of concurrent callers are not isolated from each other.
///
/// # Duplicate detection
///
/// Without unique members, [RepositoryProvider::insert_one_handle_duplicate]
/// reports a duplicate only when the identifier is taken or when an equal entity
/// is already stored (every mapped member equal). This is weaker than a unique
/// index: two entities that differ in any member but share a value that the live
/// store indexes as unique are both inserted. Declare unique members to get the
/// live store's behaviour.
///
/// # Examples
///
/// ```rust,ignore
/// let posts = MemoryRepository::<Post>::new()?.with_unique_fields(&["text"])?;
/// assert!(!posts.insert_one_handle_duplicate(&first, &token).await?);
/// assert!(posts.insert_one_handle_duplicate(&same_text, &token).await?);
/// ```
pub struct MemoryRepository<T: Entity> {
    inner: Arc<MemoryRepositoryInner<T>>,
}

struct MemoryRepositoryInner<T> {
    namespace: String,
    mapping: Arc<EntityMapping<T>>,
    unique_fields: Vec<String>,
    entities: Atomic<Vec<T>>,
}

impl<T: Entity> MemoryRepository<T> {
    /// Creates an empty repository.
    ///
    /// # Errors
    ///
    /// Fails when the mapping of `T` cannot be resolved.
    pub fn new() -> RepoResult<Self> {
        MemoryRepository::with_collection(Vec::new())
    }

    /// Creates a repository holding `entities`, in order.
    pub fn with_collection(entities: Vec<T>) -> RepoResult<Self> {
        let mapping = resolve::<T>()?;
        let entities = entities
            .iter()
            .map(|entity| mapping.from_document(&mapping.to_document(entity)?))
            .collect::<RepoResult<Vec<T>>>()?;
        Ok(MemoryRepository {
            inner: Arc::new(MemoryRepositoryInner {
                namespace: format!("{}.{}", MEMORY_DATABASE_NAME, T::collection_name()),
                mapping,
                unique_fields: Vec::new(),
                entities: atomic(entities),
            }),
        })
    }

    /// Declares mapped members whose values must be unique across the repository.
    ///
    /// # Errors
    ///
    /// [ErrorKind::ValidationError] when a name is not a mapped member.
    pub fn with_unique_fields(self, fields: &[&str]) -> RepoResult<Self> {
        let mapping = self.inner.mapping.clone();
        let mut unique_fields = Vec::new();
        for field in fields {
            let accessor = mapping.require_field(field, ErrorKind::ValidationError)?;
            if !accessor.is_id() {
                unique_fields.push(accessor.name().to_string());
            }
        }
        let entities = self.inner.entities.read_with(|entities| entities.clone());
        Ok(MemoryRepository {
            inner: Arc::new(MemoryRepositoryInner {
                namespace: self.inner.namespace.clone(),
                mapping,
                unique_fields,
                entities: atomic(entities),
            }),
        })
    }

    /// A copy of the stored entities, in order.
    pub fn snapshot(&self) -> Vec<T> {
        self.inner.entities.read_with(|entities| entities.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.entities.read_with(|entities| entities.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Entity> Clone for MemoryRepository<T> {
    fn clone(&self) -> Self {
        MemoryRepository {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Entity> MemoryRepositoryInner<T> {
    fn positions(
        &self,
        entities: &[T],
        predicate: Option<&Predicate<T>>,
        first_only: bool,
    ) -> RepoResult<Vec<usize>> {
        if let Some(predicate) = predicate {
            // reject what the live backend could not translate, even on an empty list
            FilterTranslator::new(&self.mapping).translate(&predicate.normalized())?;
        }
        let evaluator = PredicateEvaluator::new(&self.mapping);
        let mut positions = Vec::new();
        for (position, entity) in entities.iter().enumerate() {
            let matched = match predicate {
                None => true,
                Some(predicate) => evaluator.evaluate(predicate.expr(), entity)?,
            };
            if matched {
                positions.push(position);
                if first_only {
                    break;
                }
            }
        }
        Ok(positions)
    }

    fn position_of_id(&self, entities: &[T], id: &Value) -> RepoResult<Option<usize>> {
        for (position, entity) in entities.iter().enumerate() {
            if &self.mapping.id_value(entity)? == id {
                return Ok(Some(position));
            }
        }
        Ok(None)
    }

    fn same_document(&self, a: &T, b: &T) -> RepoResult<bool> {
        Ok(self.mapping.to_document(a)? == self.mapping.to_document(b)?)
    }

    /// `entity` as the live store would read it back, with member values passed
    /// through their stored form.
    fn stored_form(&self, entity: &T) -> RepoResult<T> {
        self.mapping.from_document(&self.mapping.to_document(entity)?)
    }

    fn check_unique(&self, entities: &[T], candidate: &T, replacing: Option<usize>) -> RepoResult<()> {
        let id_accessor = self.mapping.id_accessor();
        let id = id_accessor.get(candidate)?;
        if let Some(position) = self.position_of_id(entities, &id)? {
            if Some(position) != replacing {
                return Err(duplicate_key_error(&self.namespace, id_accessor.element_name(), &id));
            }
        }

        for field in &self.unique_fields {
            let accessor = self.mapping.require_field(field, ErrorKind::InternalError)?;
            let value = accessor.get(candidate)?;
            if value.is_null() {
                continue;
            }
            for (position, existing) in entities.iter().enumerate() {
                if Some(position) != replacing && accessor.get(existing)? == value {
                    return Err(duplicate_key_error(&self.namespace, accessor.element_name(), &value));
                }
            }
        }
        Ok(())
    }

    /// Stores `entity` at the end; returns its position.
    fn insert(&self, entities: &mut Vec<T>, entity: &T) -> RepoResult<usize> {
        let stored = self.stored_form(entity)?;
        self.check_unique(entities, &stored, None)?;
        entities.push(stored);
        Ok(entities.len() - 1)
    }

    /// Applies `updates` to the entity at `position`; returns whether it changed.
    fn update_at(&self, entities: &mut [T], position: usize, updates: &Updates<T>) -> RepoResult<bool> {
        let mut updated = entities[position].clone();
        updates.apply_to(&mut updated, &self.mapping, false)?;
        if self.same_document(&entities[position], &updated)? {
            return Ok(false);
        }
        let updated = self.stored_form(&updated)?;
        self.check_unique(entities, &updated, Some(position))?;
        entities[position] = updated;
        Ok(true)
    }

    fn replace_at(&self, entities: &mut [T], position: usize, replacement: &T) -> RepoResult<bool> {
        if self.same_document(&entities[position], replacement)? {
            return Ok(false);
        }
        let replacement = self.stored_form(replacement)?;
        self.check_unique(entities, &replacement, Some(position))?;
        entities[position] = replacement;
        Ok(true)
    }

    /// Creates an entity from the top-level equality terms of `predicate`, applies
    /// `updates` on the insert path and stores it; returns its identifier.
    fn upsert_new(
        &self,
        entities: &mut Vec<T>,
        predicate: &Predicate<T>,
        updates: &Updates<T>,
    ) -> RepoResult<Value> {
        let filter = FilterTranslator::new(&self.mapping).translate(&predicate.normalized())?;
        let seed: Document = filter.equality_terms().into_iter().collect();
        let mut entity = self.mapping.from_document(&seed)?;
        if !seed.has_id() {
            self.mapping
                .id_accessor()
                .set(&mut entity, &Value::ObjectId(ObjectId::new()))?;
        }
        updates.apply_to(&mut entity, &self.mapping, true)?;
        let id = self.mapping.id_value(&entity)?;
        self.insert(entities, &entity)?;
        Ok(id)
    }

    /// Replaces by identifier; returns `(modified, inserted)`.
    fn replace(&self, entities: &mut Vec<T>, entity: &T, is_upsert: bool) -> RepoResult<(bool, bool)> {
        let id = self.mapping.id_value(entity)?;
        match self.position_of_id(entities, &id)? {
            Some(position) => Ok((self.replace_at(entities, position, entity)?, false)),
            None if is_upsert => {
                self.insert(entities, entity)?;
                Ok((false, true))
            }
            None => Ok((false, false)),
        }
    }

    /// Sets every mapped member by identifier; returns `(modified, inserted)`.
    fn update_entity(&self, entities: &mut Vec<T>, entity: &T, is_upsert: bool) -> RepoResult<(bool, bool)> {
        let updates = Updates::new().set_all_mapped(entity, &[])?;
        let id = self.mapping.id_value(entity)?;
        match self.position_of_id(entities, &id)? {
            Some(position) => Ok((self.update_at(entities, position, &updates)?, false)),
            None if is_upsert => {
                let mut created = T::default();
                self.mapping.id_accessor().set(&mut created, &id)?;
                updates.apply_to(&mut created, &self.mapping, true)?;
                self.insert(entities, &created)?;
                Ok((false, true))
            }
            None => Ok((false, false)),
        }
    }

    /// Runs `request` for every entity, collecting failures instead of stopping.
    fn batch(
        &self,
        operation: &str,
        entities: &[T],
        request: impl Fn(&mut Vec<T>, &T) -> RepoResult<(bool, bool)>,
    ) -> RepoResult<u64> {
        if entities.is_empty() {
            return Ok(0);
        }
        log::debug!("{} runs {} request(s) on {}", operation, entities.len(), self.namespace);
        let (count, failures) = self.entities.write_with(|stored| {
            let mut count = 0;
            let mut failures = Vec::new();
            for (index, entity) in entities.iter().enumerate() {
                match request(stored, entity) {
                    Ok((modified, inserted)) => count += u64::from(modified) + u64::from(inserted),
                    Err(error) => failures.push(WriteFailure { index, error }),
                }
            }
            (count, failures)
        });
        batch_result(operation, count, failures)
    }
}

#[async_trait]
impl<T: Entity> RepositoryProvider<T> for MemoryRepository<T> {
    async fn insert_one(&self, entity: &T, token: &CancellationToken) -> RepoResult<()> {
        check_cancelled(token, "insert_one")?;
        self.inner
            .entities
            .write_with(|entities| self.inner.insert(entities, entity).map(|_| ()))
            .map_err(|err| map_write_error("insert_one", err))
    }

    async fn insert_many(&self, entities: &[T], token: &CancellationToken) -> RepoResult<()> {
        check_cancelled(token, "insert_many")?;
        self.inner
            .entities
            .write_with(|stored| -> RepoResult<()> {
                for entity in entities {
                    self.inner.insert(stored, entity)?;
                }
                Ok(())
            })
            .map_err(|err| map_write_error("insert_many", err))
    }

    async fn insert_one_handle_duplicate(&self, entity: &T, token: &CancellationToken) -> RepoResult<bool> {
        check_cancelled(token, "insert_one_handle_duplicate")?;
        let contained = self.inner.entities.read_with(|entities| -> RepoResult<bool> {
            for existing in entities {
                if self.inner.same_document(existing, entity)? {
                    return Ok(true);
                }
            }
            Ok(false)
        })?;
        if contained {
            log::warn!("Skipped duplicate {} in {}", self.inner.mapping.type_name(), self.inner.namespace);
            return Ok(true);
        }
        match self.insert_one(entity, token).await {
            Ok(()) => Ok(false),
            Err(err) if err.is_duplicate_key() => {
                log::warn!(
                    "Skipped duplicate {} in {}: {}",
                    self.inner.mapping.type_name(),
                    self.inner.namespace,
                    err.chain().last().map(|cause| cause.message()).unwrap_or_default()
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
        check_cancelled(token, "count_documents")?;
        let positions = self
            .inner
            .entities
            .read_with(|entities| self.inner.positions(entities, predicate, false))?;
        Ok(positions.len() as u64)
    }

    async fn find_one(&self, predicate: &Predicate<T>, token: &CancellationToken) -> RepoResult<Option<T>> {
        check_cancelled(token, "find_one")?;
        self.inner.entities.read_with(|entities| -> RepoResult<Option<T>> {
            let positions = self.inner.positions(entities, Some(predicate), true)?;
            Ok(positions.first().map(|position| entities[*position].clone()))
        })
    }

    async fn find_all(
        &self,
        predicate: Option<&Predicate<T>>,
        token: &CancellationToken,
    ) -> RepoResult<Vec<T>> {
        check_cancelled(token, "find_all")?;
        self.inner.entities.read_with(|entities| -> RepoResult<Vec<T>> {
            let positions = self.inner.positions(entities, predicate, false)?;
            Ok(positions.iter().map(|position| entities[*position].clone()).collect())
        })
    }

    async fn find_many(
        &self,
        predicate: &Predicate<T>,
        page_index: i64,
        page_size: i64,
        order_by: Option<&OrderBy>,
        token: &CancellationToken,
    ) -> RepoResult<Vec<T>> {
        let skip = to_skip(page_index, page_size)? as usize;
        check_cancelled(token, "find_many")?;
        let mut matches = self.inner.entities.read_with(|entities| -> RepoResult<Vec<T>> {
            let positions = self.inner.positions(entities, Some(predicate), false)?;
            Ok(positions.iter().map(|position| entities[*position].clone()).collect())
        })?;

        if let Some(order_by) = order_by {
            let accessor = self
                .inner
                .mapping
                .require_field(order_by.field(), ErrorKind::FilterError)?;
            let mut keyed = matches
                .into_iter()
                .map(|entity| -> RepoResult<(Value, T)> { Ok((accessor.get(&entity)?, entity)) })
                .collect::<RepoResult<Vec<(Value, T)>>>()?;
            keyed.sort_by(|a, b| order_by.order().apply(a.0.cmp(&b.0)));
            matches = keyed.into_iter().map(|(_, entity)| entity).collect();
        }
        Ok(matches.into_iter().skip(skip).take(page_size as usize).collect())
    }

    async fn find_one_and_delete(
        &self,
        predicate: &Predicate<T>,
        token: &CancellationToken,
    ) -> RepoResult<Option<T>> {
        check_cancelled(token, "find_one_and_delete")?;
        self.inner.entities.write_with(|entities| -> RepoResult<Option<T>> {
            let positions = self.inner.positions(entities, Some(predicate), true)?;
            Ok(positions.first().map(|position| entities.remove(*position)))
        })
    }

    async fn find_one_and_update(
        &self,
        predicate: &Predicate<T>,
        updates: &Updates<T>,
        return_document: ReturnDocument,
        token: &CancellationToken,
    ) -> RepoResult<Option<T>> {
        require_updates(updates)?;
        check_cancelled(token, "find_one_and_update")?;
        self.inner
            .entities
            .write_with(|entities| -> RepoResult<Option<T>> {
                let positions = self.inner.positions(entities, Some(predicate), true)?;
                let Some(&position) = positions.first() else {
                    return Ok(None);
                };
                let before = entities[position].clone();
                self.inner.update_at(entities, position, updates)?;
                Ok(Some(match return_document {
                    ReturnDocument::Before => before,
                    ReturnDocument::After => entities[position].clone(),
                }))
            })
            .map_err(|err| map_write_error("find_one_and_update", err))
    }

    async fn find_one_and_replace(
        &self,
        entity: &T,
        is_upsert: bool,
        return_document: ReturnDocument,
        token: &CancellationToken,
    ) -> RepoResult<Option<T>> {
        check_cancelled(token, "find_one_and_replace")?;
        let id = self.inner.mapping.id_value(entity)?;
        self.inner
            .entities
            .write_with(|entities| -> RepoResult<Option<T>> {
                match self.inner.position_of_id(entities, &id)? {
                    Some(position) => {
                        let before = entities[position].clone();
                        self.inner.replace_at(entities, position, entity)?;
                        Ok(Some(match return_document {
                            ReturnDocument::Before => before,
                            ReturnDocument::After => entities[position].clone(),
                        }))
                    }
                    None if is_upsert => {
                        let position = self.inner.insert(entities, entity)?;
                        Ok(match return_document {
                            ReturnDocument::Before => None,
                            ReturnDocument::After => Some(entities[position].clone()),
                        })
                    }
                    None => Ok(None),
                }
            })
            .map_err(|err| map_write_error("find_one_and_replace", err))
    }

    async fn update_one(
        &self,
        predicate: &Predicate<T>,
        updates: &Updates<T>,
        token: &CancellationToken,
    ) -> RepoResult<u64> {
        let outcome = self.upsert_or_update(predicate, updates, false, token)?;
        Ok(outcome.modified_count)
    }

    async fn update_many(
        &self,
        predicate: &Predicate<T>,
        updates: &Updates<T>,
        token: &CancellationToken,
    ) -> RepoResult<u64> {
        require_updates(updates)?;
        check_cancelled(token, "update_many")?;
        self.inner
            .entities
            .write_with(|entities| -> RepoResult<u64> {
                let positions = self.inner.positions(entities, Some(predicate), false)?;
                let mut modified = 0;
                for position in positions {
                    if self.inner.update_at(entities, position, updates)? {
                        modified += 1;
                    }
                }
                Ok(modified)
            })
            .map_err(|err| map_write_error("update_many", err))
    }

    async fn upsert_one(
        &self,
        predicate: &Predicate<T>,
        updates: &Updates<T>,
        token: &CancellationToken,
    ) -> RepoResult<UpsertOutcome> {
        self.upsert_or_update(predicate, updates, true, token)
    }

    async fn update_entity(&self, entity: &T, token: &CancellationToken) -> RepoResult<u64> {
        check_cancelled(token, "update_entity")?;
        let (modified, _) = self
            .inner
            .entities
            .write_with(|entities| self.inner.update_entity(entities, entity, false))
            .map_err(|err| map_write_error("update_entity", err))?;
        Ok(u64::from(modified))
    }

    async fn update_entities(&self, entities: &[T], token: &CancellationToken) -> RepoResult<u64> {
        check_cancelled(token, "update_entities")?;
        self.inner.batch("update_entities", entities, |stored, entity| {
            self.inner.update_entity(stored, entity, false)
        })
    }

    async fn upsert_entities(&self, entities: &[T], token: &CancellationToken) -> RepoResult<u64> {
        check_cancelled(token, "upsert_entities")?;
        self.inner.batch("upsert_entities", entities, |stored, entity| {
            self.inner.update_entity(stored, entity, true)
        })
    }

    async fn delete_one(&self, predicate: &Predicate<T>, token: &CancellationToken) -> RepoResult<u64> {
        check_cancelled(token, "delete_one")?;
        self.inner.entities.write_with(|entities| -> RepoResult<u64> {
            let positions = self.inner.positions(entities, Some(predicate), true)?;
            for position in &positions {
                entities.remove(*position);
            }
            Ok(positions.len() as u64)
        })
    }

    async fn delete_many(&self, predicate: &Predicate<T>, token: &CancellationToken) -> RepoResult<u64> {
        check_cancelled(token, "delete_many")?;
        self.inner.entities.write_with(|entities| -> RepoResult<u64> {
            let positions = self.inner.positions(entities, Some(predicate), false)?;
            for position in positions.iter().rev() {
                entities.remove(*position);
            }
            Ok(positions.len() as u64)
        })
    }

    async fn replace_one(&self, entity: &T, is_upsert: bool, token: &CancellationToken) -> RepoResult<u64> {
        check_cancelled(token, "replace_one")?;
        let (modified, _) = self
            .inner
            .entities
            .write_with(|entities| self.inner.replace(entities, entity, is_upsert))
            .map_err(|err| map_write_error("replace_one", err))?;
        Ok(u64::from(modified))
    }

    async fn replace_many(&self, entities: &[T], is_upsert: bool, token: &CancellationToken) -> RepoResult<u64> {
        check_cancelled(token, "replace_many")?;
        self.inner.batch("replace_many", entities, |stored, entity| {
            self.inner.replace(stored, entity, is_upsert)
        })
    }
}

impl<T: Entity> MemoryRepository<T> {
    fn upsert_or_update(
        &self,
        predicate: &Predicate<T>,
        updates: &Updates<T>,
        upsert: bool,
        token: &CancellationToken,
    ) -> RepoResult<UpsertOutcome> {
        let operation = if upsert { "upsert_one" } else { "update_one" };
        require_updates(updates)?;
        check_cancelled(token, operation)?;
        self.inner
            .entities
            .write_with(|entities| -> RepoResult<UpsertOutcome> {
                let positions = self.inner.positions(entities, Some(predicate), true)?;
                match positions.first() {
                    Some(&position) => Ok(UpsertOutcome {
                        matched_count: 1,
                        modified_count: u64::from(self.inner.update_at(entities, position, updates)?),
                        upserted_id: None,
                    }),
                    None if upsert => Ok(UpsertOutcome {
                        upserted_id: Some(self.inner.upsert_new(entities, predicate, updates)?),
                        ..UpsertOutcome::default()
                    }),
                    None => Ok(UpsertOutcome::default()),
                }
            })
            .map_err(|err| map_write_error(operation, err))
    }
}
