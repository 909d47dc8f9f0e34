use crate::common::{SortOrder, Value};
use crate::errors::RepoResult;
use crate::mapping::Entity;
use crate::predicate::Predicate;
use crate::store::ReturnDocument;
use crate::update::Updates;
use async_trait::async_trait;
use std::ops::Deref;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Sort order of a paged query: a mapped member and a direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    field: String,
    order: SortOrder,
}

impl OrderBy {
    pub fn new(field: &str, order: SortOrder) -> Self {
        OrderBy {
            field: field.to_string(),
            order,
        }
    }

    pub fn ascending(field: &str) -> Self {
        OrderBy::new(field, SortOrder::Ascending)
    }

    pub fn descending(field: &str) -> Self {
        OrderBy::new(field, SortOrder::Descending)
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }
}

/// Outcome of [RepositoryProvider::upsert_one].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertOutcome {
    pub matched_count: u64,
    pub modified_count: u64,
    /// Identifier of the record created when nothing matched.
    pub upserted_id: Option<Value>,
}

impl UpsertOutcome {
    pub fn is_inserted(&self) -> bool {
        self.upserted_id.is_some()
    }
}

/// The typed data-access contract shared by every repository backend.
///
/// # Purpose
///
/// `RepositoryProvider` exposes uniform insert, query, update, replace and delete
/// operations over the records of one entity type. [crate::repository::LiveRepository]
/// runs them against a document store collection and
/// [crate::repository::MemoryRepository] against an in-process list; both apply the
/// same predicate and update semantics.
///
/// # Characteristics
///
/// - **Asynchronous**: every operation is an `async fn` taking a [CancellationToken].
///   A token that fires before or during the operation makes it fail with
///   [crate::errors::ErrorKind::Cancelled].
/// - **Validated early**: paging arguments, unmapped members and identifier
///   mutations are rejected before the backend is touched.
/// - **Inspectable duplicates**: uniqueness violations fail with
///   [crate::errors::ErrorKind::DuplicateKey].
/// - **Counts for multi-record writes**: zero affected records is a valid outcome.
///
/// # Relationship to Related Types
///
/// - [Repository]: the facade wrapper that implements `Deref` to this trait
/// - [Predicate]: selects records
/// - [Updates]: describes field-level mutations
#[async_trait]
pub trait RepositoryProvider<T: Entity>: Send + Sync {
    /// Inserts one entity. The identifier is taken from the entity as is.
    ///
    /// # Errors
    ///
    /// [crate::errors::ErrorKind::DuplicateKey] when the identifier or a unique
    /// member is already taken.
    async fn insert_one(&self, entity: &T, token: &CancellationToken) -> RepoResult<()>;

    /// Inserts entities in order, stopping at the first failure.
    async fn insert_many(&self, entities: &[T], token: &CancellationToken) -> RepoResult<()>;

    /// Inserts one entity, reporting a uniqueness violation as `true` instead of
    /// an error.
    ///
    /// # Returns
    ///
    /// `false` when the entity was inserted, `true` when it was a duplicate. Any
    /// other failure is returned as an error.
    async fn insert_one_handle_duplicate(&self, entity: &T, token: &CancellationToken) -> RepoResult<bool>;

    /// Counts the entities matching `predicate`, or all entities when `None`.
    async fn count_documents(
        &self,
        predicate: Option<&Predicate<T>>,
        token: &CancellationToken,
    ) -> RepoResult<u64>;

    /// Returns the first entity matching `predicate`.
    async fn find_one(&self, predicate: &Predicate<T>, token: &CancellationToken) -> RepoResult<Option<T>>;

    /// Returns every entity matching `predicate`, or all entities when `None`.
    async fn find_all(
        &self,
        predicate: Option<&Predicate<T>>,
        token: &CancellationToken,
    ) -> RepoResult<Vec<T>>;

    /// Returns one page of the entities matching `predicate`.
    ///
    /// # Arguments
    ///
    /// * `page_index` - Zero-based page number.
    /// * `page_size` - Entities per page, at least 1.
    /// * `order_by` - Optional sort; without it entities come in store order.
    ///
    /// # Errors
    ///
    /// [crate::errors::ErrorKind::ValidationError] when `page_size < 1` or
    /// `page_index < 0`, before the backend is called.
    async fn find_many(
        &self,
        predicate: &Predicate<T>,
        page_index: i64,
        page_size: i64,
        order_by: Option<&OrderBy>,
        token: &CancellationToken,
    ) -> RepoResult<Vec<T>>;

    /// Atomically removes the first entity matching `predicate` and returns it.
    async fn find_one_and_delete(
        &self,
        predicate: &Predicate<T>,
        token: &CancellationToken,
    ) -> RepoResult<Option<T>>;

    /// Atomically updates the first entity matching `predicate`.
    ///
    /// # Returns
    ///
    /// The entity as it was before or after the update, per `return_document`, or
    /// `None` when nothing matched.
    async fn find_one_and_update(
        &self,
        predicate: &Predicate<T>,
        updates: &Updates<T>,
        return_document: ReturnDocument,
        token: &CancellationToken,
    ) -> RepoResult<Option<T>>;

    /// Atomically replaces the entity with the same identifier as `entity`.
    ///
    /// # Arguments
    ///
    /// * `entity` - The replacement; its identifier selects the record.
    /// * `is_upsert` - Insert `entity` when no record has its identifier.
    /// * `return_document` - Return the record as it was before or after.
    ///
    /// # Returns
    ///
    /// The requested image, or `None` when nothing matched and no record was
    /// inserted, or when a record was inserted and the before-image was requested.
    async fn find_one_and_replace(
        &self,
        entity: &T,
        is_upsert: bool,
        return_document: ReturnDocument,
        token: &CancellationToken,
    ) -> RepoResult<Option<T>>;

    /// Updates the first entity matching `predicate`; returns the modified count (0 or 1).
    async fn update_one(
        &self,
        predicate: &Predicate<T>,
        updates: &Updates<T>,
        token: &CancellationToken,
    ) -> RepoResult<u64>;

    /// Updates every entity matching `predicate`; returns the modified count.
    async fn update_many(
        &self,
        predicate: &Predicate<T>,
        updates: &Updates<T>,
        token: &CancellationToken,
    ) -> RepoResult<u64>;

    /// Updates the first entity matching `predicate`, creating one when nothing
    /// matches.
    ///
    /// A created entity starts from the top-level equality terms of `predicate`,
    /// then receives every intent of `updates`, set-on-insert intents included.
    /// Without an identifier among the equality terms a new [crate::common::ObjectId]
    /// is generated.
    async fn upsert_one(
        &self,
        predicate: &Predicate<T>,
        updates: &Updates<T>,
        token: &CancellationToken,
    ) -> RepoResult<UpsertOutcome>;

    /// Sets every mapped member of the stored entity with the identifier of
    /// `entity`; returns the modified count (0 or 1).
    async fn update_entity(&self, entity: &T, token: &CancellationToken) -> RepoResult<u64>;

    /// Runs [RepositoryProvider::update_entity] for every entity as one unordered
    /// batch; returns the modified count.
    async fn update_entities(&self, entities: &[T], token: &CancellationToken) -> RepoResult<u64>;

    /// Like [RepositoryProvider::update_entities], inserting entities that do not
    /// exist yet; returns the upserted plus modified count.
    async fn upsert_entities(&self, entities: &[T], token: &CancellationToken) -> RepoResult<u64>;

    /// Deletes the first entity matching `predicate`; returns the deleted count (0 or 1).
    async fn delete_one(&self, predicate: &Predicate<T>, token: &CancellationToken) -> RepoResult<u64>;

    /// Deletes every entity matching `predicate`; returns the deleted count.
    async fn delete_many(&self, predicate: &Predicate<T>, token: &CancellationToken) -> RepoResult<u64>;

    /// Replaces the entity with the same identifier as `entity`.
    ///
    /// # Returns
    ///
    /// The modified count: 1 when a stored entity changed, 0 when it was already
    /// equal, when nothing matched, or when `entity` was inserted by an upsert.
    async fn replace_one(&self, entity: &T, is_upsert: bool, token: &CancellationToken) -> RepoResult<u64>;

    /// Replaces every entity by identifier as one unordered batch.
    ///
    /// A failing request does not stop the others; the first failure is returned
    /// after the whole batch ran.
    ///
    /// # Returns
    ///
    /// The upserted plus modified count.
    async fn replace_many(&self, entities: &[T], is_upsert: bool, token: &CancellationToken) -> RepoResult<u64>;
}

/// A typed repository facade.
///
/// `Repository<T>` wraps an implementation of [RepositoryProvider] and exposes all
/// of its operations through `Deref`. It is cheap to clone.
///
/// # Examples
///
/// ```rust,ignore
/// let repository: Repository<Post> = Repository::new(MemoryRepository::new()?);
/// repository.insert_one(&post, &token).await?;
/// let found = repository.find_one(&id().eq(post.id), &token).await?;
/// ```
pub struct Repository<T: Entity> {
    inner: Arc<dyn RepositoryProvider<T>>,
}

impl<T: Entity> Repository<T> {
    /// Creates a facade over a backend implementation.
    pub fn new<R: RepositoryProvider<T> + 'static>(inner: R) -> Self {
        Repository {
            inner: Arc::new(inner),
        }
    }
}

impl<T: Entity> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Repository {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Entity> Deref for Repository<T> {
    type Target = Arc<dyn RepositoryProvider<T>>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
