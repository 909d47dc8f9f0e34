use crate::common::{Convertible, Document, Value, DOC_ID};
use crate::errors::{ErrorKind, RepoError, RepoResult};
use crate::mapping::{resolve, Entity, FieldAccessor};
use std::collections::HashMap;

/// The persistence mapping of an entity type: its identifier accessor and the
/// ordered list of mapped members (identifier first).
pub struct EntityMapping<T> {
    type_name: String,
    id_index: usize,
    fields: Vec<FieldAccessor<T>>,
    by_name: HashMap<String, usize>,
}

impl<T: 'static> EntityMapping<T> {
    /// Starts a mapping for the type named `type_name`.
    pub fn builder(type_name: &str) -> EntityMappingBuilder<T> {
        EntityMappingBuilder {
            type_name: type_name.to_string(),
            fields: Vec::new(),
            error: None,
        }
    }
}

impl<T> EntityMapping<T> {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Accessor of the identifier member.
    pub fn id_accessor(&self) -> &FieldAccessor<T> {
        &self.fields[self.id_index]
    }

    /// Reads the identifier value of an entity.
    pub fn id_value(&self, entity: &T) -> RepoResult<Value> {
        self.id_accessor().get(entity)
    }

    /// All mapped members, identifier first, then inherited and own members in
    /// declaration order.
    pub fn fields(&self) -> &[FieldAccessor<T>] {
        &self.fields
    }

    /// Looks a mapped member up by its member name.
    pub fn field(&self, name: &str) -> Option<&FieldAccessor<T>> {
        self.by_name.get(name).map(|index| &self.fields[*index])
    }

    /// Looks a mapped member up, failing with `error_kind` when it is not mapped.
    pub fn require_field(&self, name: &str, error_kind: ErrorKind) -> RepoResult<&FieldAccessor<T>> {
        self.field(name).ok_or_else(|| {
            log::error!("Field {} is not mapped for {}", name, self.type_name);
            RepoError::new(
                &format!("Field '{}' is not a mapped member of {}", name, self.type_name),
                error_kind,
            )
        })
    }

    /// Converts an entity into its stored document form.
    pub fn to_document(&self, entity: &T) -> RepoResult<Document> {
        let mut document = Document::new();
        for field in &self.fields {
            document.put(field.element_name(), field.get(entity)?)?;
        }
        Ok(document)
    }
}

impl<T: Default> EntityMapping<T> {
    /// Materializes an entity from a stored document.
    ///
    /// Members whose element is absent keep their default value; unmapped elements
    /// are ignored.
    pub fn from_document(&self, document: &Document) -> RepoResult<T> {
        let mut entity = T::default();
        for field in &self.fields {
            if let Some(value) = document.get(field.element_name()) {
                field.set(&mut entity, value)?;
            }
        }
        Ok(entity)
    }
}

/// Fluent builder for [EntityMapping].
pub struct EntityMappingBuilder<T> {
    type_name: String,
    fields: Vec<FieldAccessor<T>>,
    error: Option<RepoError>,
}

impl<T: 'static> EntityMappingBuilder<T> {
    /// Declares the identifier member. It is stored under the `_id` element.
    pub fn id<V: Convertible + 'static>(
        mut self,
        name: &str,
        get: fn(&T) -> &V,
        get_mut: fn(&mut T) -> &mut V,
    ) -> Self {
        self.fields
            .push(FieldAccessor::new(name, DOC_ID, true, get, get_mut));
        self
    }

    /// Declares a persisted member stored under its own name.
    pub fn field<V: Convertible + 'static>(
        self,
        name: &str,
        get: fn(&T) -> &V,
        get_mut: fn(&mut T) -> &mut V,
    ) -> Self {
        self.field_with_element_name(name, name, get, get_mut)
    }

    /// Declares a persisted member stored under a different element name.
    pub fn field_with_element_name<V: Convertible + 'static>(
        mut self,
        name: &str,
        element_name: &str,
        get: fn(&T) -> &V,
        get_mut: fn(&mut T) -> &mut V,
    ) -> Self {
        self.fields
            .push(FieldAccessor::new(name, element_name, false, get, get_mut));
        self
    }

    /// Includes every mapped member of an embedded base entity, identifier included.
    ///
    /// This is how a type extends another: the base is a member of the derived type
    /// and its members are flattened into the derived document.
    pub fn inherit<B: Entity>(mut self, get: fn(&T) -> &B, get_mut: fn(&mut T) -> &mut B) -> Self {
        match resolve::<B>() {
            Ok(base) => {
                for field in base.fields() {
                    self.fields.push(field.lift(get, get_mut));
                }
            }
            Err(err) => {
                if self.error.is_none() {
                    self.error = Some(err);
                }
            }
        }
        self
    }

    /// Validates and builds the mapping.
    ///
    /// # Errors
    ///
    /// [ErrorKind::ValidationError] when no identifier was declared, when more than
    /// one was declared, or when two members share a name or an element name.
    pub fn build(self) -> RepoResult<EntityMapping<T>> {
        if let Some(err) = self.error {
            return Err(RepoError::new_with_cause(
                &format!("Failed to resolve base mapping of {}", self.type_name),
                ErrorKind::ValidationError,
                err,
            ));
        }

        let id_positions: Vec<usize> = self
            .fields
            .iter()
            .enumerate()
            .filter(|(_, field)| field.is_id())
            .map(|(index, _)| index)
            .collect();
        if id_positions.is_empty() {
            log::error!("No identifier mapped for {}", self.type_name);
            return Err(RepoError::new(
                &format!("Type {} has no identifier mapping", self.type_name),
                ErrorKind::ValidationError,
            ));
        }
        if id_positions.len() > 1 {
            log::error!("More than one identifier mapped for {}", self.type_name);
            return Err(RepoError::new(
                &format!("Type {} maps more than one identifier", self.type_name),
                ErrorKind::ValidationError,
            ));
        }

        let mut fields = self.fields;
        let id_field = fields.remove(id_positions[0]);
        fields.insert(0, id_field);

        let mut by_name = HashMap::new();
        let mut element_names = HashMap::new();
        for (index, field) in fields.iter().enumerate() {
            if by_name.insert(field.name().to_string(), index).is_some()
                || element_names
                    .insert(field.element_name().to_string(), index)
                    .is_some()
            {
                log::error!("Duplicate mapped member {} in {}", field.name(), self.type_name);
                return Err(RepoError::new(
                    &format!(
                        "Member '{}' of {} is mapped more than once",
                        field.name(),
                        self.type_name
                    ),
                    ErrorKind::ValidationError,
                ));
            }
        }

        Ok(EntityMapping {
            type_name: self.type_name,
            id_index: 0,
            fields,
            by_name,
        })
    }
}
