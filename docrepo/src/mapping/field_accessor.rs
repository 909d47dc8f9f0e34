use crate::common::{Convertible, Value};
use crate::errors::{ErrorKind, RepoError, RepoResult};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

type Getter<T> = Arc<dyn Fn(&T) -> RepoResult<Value> + Send + Sync>;
type Setter<T> = Arc<dyn Fn(&mut T, &Value) -> RepoResult<()> + Send + Sync>;

/// Typed read/write access to one persisted member of an entity.
///
/// `name` is the member name used in predicates and update descriptors;
/// `element_name` is the field name inside the stored document.
pub struct FieldAccessor<T> {
    name: String,
    element_name: String,
    is_id: bool,
    getter: Getter<T>,
    setter: Setter<T>,
}

impl<T: 'static> FieldAccessor<T> {
    /// Creates an accessor from a pair of borrowing projections.
    pub fn new<V: Convertible + 'static>(
        name: &str,
        element_name: &str,
        is_id: bool,
        get: fn(&T) -> &V,
        get_mut: fn(&mut T) -> &mut V,
    ) -> Self {
        let field_name = name.to_string();
        FieldAccessor {
            name: name.to_string(),
            element_name: element_name.to_string(),
            is_id,
            getter: Arc::new(move |entity: &T| get(entity).to_value()),
            setter: Arc::new(move |entity: &mut T, value: &Value| {
                let converted = V::from_value(value).map_err(|err| {
                    RepoError::new_with_cause(
                        &format!("Failed to set field '{}'", field_name),
                        ErrorKind::ObjectMappingError,
                        err,
                    )
                })?;
                *get_mut(entity) = converted;
                Ok(())
            }),
        }
    }

    /// Lifts an accessor of a base type into an accessor of a type embedding it.
    pub(crate) fn lift<D: 'static>(
        &self,
        get: fn(&D) -> &T,
        get_mut: fn(&mut D) -> &mut T,
    ) -> FieldAccessor<D> {
        let getter = self.getter.clone();
        let setter = self.setter.clone();
        FieldAccessor {
            name: self.name.clone(),
            element_name: self.element_name.clone(),
            is_id: self.is_id,
            getter: Arc::new(move |entity: &D| getter(get(entity))),
            setter: Arc::new(move |entity: &mut D, value: &Value| setter(get_mut(entity), value)),
        }
    }
}

impl<T> FieldAccessor<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn element_name(&self) -> &str {
        &self.element_name
    }

    pub fn is_id(&self) -> bool {
        self.is_id
    }

    /// Reads the member as a [Value].
    pub fn get(&self, entity: &T) -> RepoResult<Value> {
        (self.getter)(entity)
    }

    /// Writes a [Value] into the member, converting it to the member's type.
    pub fn set(&self, entity: &mut T, value: &Value) -> RepoResult<()> {
        (self.setter)(entity, value)
    }
}

impl<T> Clone for FieldAccessor<T> {
    fn clone(&self) -> Self {
        FieldAccessor {
            name: self.name.clone(),
            element_name: self.element_name.clone(),
            is_id: self.is_id,
            getter: self.getter.clone(),
            setter: self.setter.clone(),
        }
    }
}

impl<T> Debug for FieldAccessor<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldAccessor")
            .field("name", &self.name)
            .field("element_name", &self.element_name)
            .field("is_id", &self.is_id)
            .finish()
    }
}
