use crate::common::{increment_value, pull_value, push_value, Value};
use crate::errors::{ErrorKind, RepoError, RepoResult};
use crate::mapping::{resolve, Entity, EntityMapping, FieldAccessor};
use crate::store::{UpdateDefinition, UpdateOperation};
use std::fmt::{Debug, Display, Formatter};
use std::marker::PhantomData;

/// One mutation intent: a mapped member name and its operand.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    field: String,
    value: Value,
}

impl FieldUpdate {
    pub fn new<V: Into<Value>>(field: &str, value: V) -> Self {
        FieldUpdate {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdateKind {
    Set,
    Increment,
    SetOnInsert,
    Push,
    Pull,
}

impl UpdateKind {
    fn name(&self) -> &'static str {
        match self {
            UpdateKind::Set => "set",
            UpdateKind::Increment => "increment",
            UpdateKind::SetOnInsert => "set_on_insert",
            UpdateKind::Push => "push",
            UpdateKind::Pull => "pull",
        }
    }
}

/// A backend-independent description of field-level mutations of an entity.
///
/// Intents accumulate in five lists: sets, increments, set-on-inserts, pushes and
/// pulls. Nothing is resolved or applied while building; member names are checked
/// against the entity mapping when the descriptor is executed, so one descriptor
/// can be reused across calls.
///
/// Execution applies the lists in that order, and each list in the order its
/// intents were added. Set-on-insert intents only apply when the operation creates
/// a new record.
///
/// # Examples
///
/// ```rust,ignore
/// let updates = Updates::<Post>::new()
///     .set("text", "edited")
///     .increment("counter", 2)
///     .increment("counter", 1)
///     .push("history", 7)
///     .set_on_insert("created_time_utc", Utc::now());
/// repository.update_one(&id().eq(post.id), &updates, &token).await?;
/// ```
pub struct Updates<T> {
    sets: Vec<FieldUpdate>,
    increments: Vec<FieldUpdate>,
    set_on_inserts: Vec<FieldUpdate>,
    pushes: Vec<FieldUpdate>,
    pulls: Vec<FieldUpdate>,
    _marker: PhantomData<fn(&T)>,
}

impl<T> Updates<T> {
    pub fn new() -> Self {
        Updates {
            sets: Vec::new(),
            increments: Vec::new(),
            set_on_inserts: Vec::new(),
            pushes: Vec::new(),
            pulls: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Overwrites the member `field` with `value`.
    pub fn set<V: Into<Value>>(mut self, field: &str, value: V) -> Self {
        self.sets.push(FieldUpdate::new(field, value));
        self
    }

    /// Adds `delta` to the numeric member `field` at execution time.
    ///
    /// Several increments of the same member accumulate.
    pub fn increment<V: Into<Value>>(mut self, field: &str, delta: V) -> Self {
        self.increments.push(FieldUpdate::new(field, delta));
        self
    }

    /// Sets the member `field` only when the operation inserts a new record.
    pub fn set_on_insert<V: Into<Value>>(mut self, field: &str, value: V) -> Self {
        self.set_on_inserts.push(FieldUpdate::new(field, value));
        self
    }

    /// Appends `value` to the list member `field`.
    pub fn push<V: Into<Value>>(mut self, field: &str, value: V) -> Self {
        self.pushes.push(FieldUpdate::new(field, value));
        self
    }

    /// Removes every element equal to `value` from the list member `field`.
    pub fn pull<V: Into<Value>>(mut self, field: &str, value: V) -> Self {
        self.pulls.push(FieldUpdate::new(field, value));
        self
    }

    /// True when all five intent lists are empty.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
            && self.increments.is_empty()
            && self.set_on_inserts.is_empty()
            && self.pushes.is_empty()
            && self.pulls.is_empty()
    }

    pub fn sets(&self) -> &[FieldUpdate] {
        &self.sets
    }

    pub fn increments(&self) -> &[FieldUpdate] {
        &self.increments
    }

    pub fn set_on_inserts(&self) -> &[FieldUpdate] {
        &self.set_on_inserts
    }

    pub fn pushes(&self) -> &[FieldUpdate] {
        &self.pushes
    }

    pub fn pulls(&self) -> &[FieldUpdate] {
        &self.pulls
    }

    fn ordered(&self) -> impl Iterator<Item = (UpdateKind, &FieldUpdate)> {
        tagged(UpdateKind::Set, &self.sets)
            .chain(tagged(UpdateKind::Increment, &self.increments))
            .chain(tagged(UpdateKind::SetOnInsert, &self.set_on_inserts))
            .chain(tagged(UpdateKind::Push, &self.pushes))
            .chain(tagged(UpdateKind::Pull, &self.pulls))
    }

    /// Resolves every intent against the mapping, in execution order.
    fn resolved<'a>(
        &'a self,
        mapping: &'a EntityMapping<T>,
    ) -> RepoResult<Vec<(UpdateKind, &'a FieldAccessor<T>, &'a Value)>> {
        let mut resolved = Vec::new();
        for (kind, update) in self.ordered() {
            let accessor = mapping.require_field(update.field(), ErrorKind::InvalidOperation)?;
            if accessor.is_id() && kind != UpdateKind::SetOnInsert {
                log::error!(
                    "Update intent {} targets the identifier {} of {}",
                    kind.name(),
                    update.field(),
                    mapping.type_name()
                );
                return Err(RepoError::new(
                    &format!(
                        "The identifier '{}' of {} cannot be modified by {}",
                        update.field(),
                        mapping.type_name(),
                        kind.name()
                    ),
                    ErrorKind::InvalidOperation,
                ));
            }
            resolved.push((kind, accessor, update.value()));
        }
        Ok(resolved)
    }

    /// Translates the descriptor into the store's update definition, using
    /// document element names.
    ///
    /// # Errors
    ///
    /// [ErrorKind::InvalidOperation] when an intent names an unmapped member or
    /// would modify the identifier.
    pub fn to_definition(&self, mapping: &EntityMapping<T>) -> RepoResult<UpdateDefinition> {
        let mut definition = UpdateDefinition::new();
        for (kind, accessor, value) in self.resolved(mapping)? {
            let element = accessor.element_name().to_string();
            let value = value.clone();
            definition = definition.add(match kind {
                UpdateKind::Set => UpdateOperation::Set(element, value),
                UpdateKind::Increment => UpdateOperation::Inc(element, value),
                UpdateKind::SetOnInsert => UpdateOperation::SetOnInsert(element, value),
                UpdateKind::Push => UpdateOperation::Push(element, value),
                UpdateKind::Pull => UpdateOperation::Pull(element, value),
            });
        }
        Ok(definition)
    }

    /// Applies the descriptor to an entity in place, through the mapping's
    /// accessors.
    ///
    /// `is_insert` is true when `entity` is a record being created; only then do
    /// set-on-insert intents apply. Nothing is written when an intent fails to
    /// resolve.
    pub fn apply_to(&self, entity: &mut T, mapping: &EntityMapping<T>, is_insert: bool) -> RepoResult<()> {
        for (kind, accessor, value) in self.resolved(mapping)? {
            let name = accessor.name();
            match kind {
                UpdateKind::Set => accessor.set(entity, value)?,
                UpdateKind::SetOnInsert => {
                    if is_insert {
                        accessor.set(entity, value)?;
                    }
                }
                UpdateKind::Increment => {
                    let updated = increment_value(name, &accessor.get(entity)?, value)?;
                    accessor.set(entity, &updated)?;
                }
                UpdateKind::Push => {
                    let updated = push_value(name, &accessor.get(entity)?, value)?;
                    accessor.set(entity, &updated)?;
                }
                UpdateKind::Pull => {
                    let updated = pull_value(name, &accessor.get(entity)?, value)?;
                    accessor.set(entity, &updated)?;
                }
            }
        }
        Ok(())
    }
}

impl<T: Entity> Updates<T> {
    /// Adds a set intent for every mapped member of `entity` except the identifier
    /// and the members named in `exclude`.
    pub fn set_all_mapped(self, entity: &T, exclude: &[&str]) -> RepoResult<Self> {
        let mapping = resolve::<T>()?;
        let mut updates = self;
        for accessor in mapped_members(&mapping, exclude) {
            updates.sets.push(FieldUpdate::new(accessor.name(), accessor.get(entity)?));
        }
        Ok(updates)
    }

    /// Adds a set-on-insert intent for every mapped member of `entity` except the
    /// identifier and the members named in `exclude`.
    pub fn set_on_insert_all_mapped(self, entity: &T, exclude: &[&str]) -> RepoResult<Self> {
        let mapping = resolve::<T>()?;
        let mut updates = self;
        for accessor in mapped_members(&mapping, exclude) {
            updates
                .set_on_inserts
                .push(FieldUpdate::new(accessor.name(), accessor.get(entity)?));
        }
        Ok(updates)
    }
}

fn tagged(
    kind: UpdateKind,
    updates: &[FieldUpdate],
) -> impl Iterator<Item = (UpdateKind, &FieldUpdate)> {
    updates.iter().map(move |update| (kind, update))
}

fn mapped_members<'a, T>(
    mapping: &'a EntityMapping<T>,
    exclude: &'a [&str],
) -> impl Iterator<Item = &'a FieldAccessor<T>> {
    mapping
        .fields()
        .iter()
        .filter(move |accessor| !accessor.is_id() && !exclude.contains(&accessor.name()))
}

impl<T> Default for Updates<T> {
    fn default() -> Self {
        Updates::new()
    }
}

impl<T> Clone for Updates<T> {
    fn clone(&self) -> Self {
        Updates {
            sets: self.sets.clone(),
            increments: self.increments.clone(),
            set_on_inserts: self.set_on_inserts.clone(),
            pushes: self.pushes.clone(),
            pulls: self.pulls.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> Debug for Updates<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Updates")
            .field("sets", &self.sets)
            .field("increments", &self.increments)
            .field("set_on_inserts", &self.set_on_inserts)
            .field("pushes", &self.pushes)
            .field("pulls", &self.pulls)
            .finish()
    }
}

impl<T> Display for Updates<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (index, (kind, update)) in self.ordered().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}({}, {})", kind.name(), update.field(), update.value())?;
        }
        write!(f, "]")
    }
}
