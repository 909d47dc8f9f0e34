use crate::common::{increment_value, pull_value, push_value, Document, Value, DOC_ID};
use crate::errors::{ErrorKind, RepoError, RepoResult};
use std::fmt::{Display, Formatter};

/// One field-level mutation of a stored document. Field names are element names.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOperation {
    Set(String, Value),
    Inc(String, Value),
    SetOnInsert(String, Value),
    Push(String, Value),
    Pull(String, Value),
}

impl UpdateOperation {
    pub fn field(&self) -> &str {
        match self {
            UpdateOperation::Set(field, _)
            | UpdateOperation::Inc(field, _)
            | UpdateOperation::SetOnInsert(field, _)
            | UpdateOperation::Push(field, _)
            | UpdateOperation::Pull(field, _) => field,
        }
    }

    pub fn operator(&self) -> &'static str {
        match self {
            UpdateOperation::Set(..) => "$set",
            UpdateOperation::Inc(..) => "$inc",
            UpdateOperation::SetOnInsert(..) => "$setOnInsert",
            UpdateOperation::Push(..) => "$push",
            UpdateOperation::Pull(..) => "$pull",
        }
    }

    fn value(&self) -> &Value {
        match self {
            UpdateOperation::Set(_, value)
            | UpdateOperation::Inc(_, value)
            | UpdateOperation::SetOnInsert(_, value)
            | UpdateOperation::Push(_, value)
            | UpdateOperation::Pull(_, value) => value,
        }
    }
}

/// An ordered list of [UpdateOperation]s applied atomically to one document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateDefinition {
    operations: Vec<UpdateOperation>,
}

impl UpdateDefinition {
    pub fn new() -> Self {
        UpdateDefinition::default()
    }

    pub fn add(mut self, operation: UpdateOperation) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn operations(&self) -> &[UpdateOperation] {
        &self.operations
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Applies the operations in order.
    ///
    /// `is_insert` is true when the document is being created by an upsert; only
    /// then are `SetOnInsert` operations applied.
    ///
    /// # Errors
    ///
    /// [ErrorKind::BackendError] when an operation would change the `_id` of an
    /// existing document, [ErrorKind::InvalidOperation] for type mismatches such as
    /// incrementing a string or pushing to a scalar.
    pub fn apply(&self, document: &mut Document, is_insert: bool) -> RepoResult<()> {
        for operation in &self.operations {
            let field = operation.field();
            match operation {
                UpdateOperation::SetOnInsert(_, value) => {
                    if is_insert {
                        document.put(field, value.clone())?;
                    }
                }
                UpdateOperation::Set(_, value) => {
                    self.guard_id(document, field, Some(value), is_insert)?;
                    document.put(field, value.clone())?;
                }
                UpdateOperation::Inc(_, delta) => {
                    self.guard_id(document, field, None, is_insert)?;
                    let updated = increment_value(field, &document.get_or_null(field), delta)?;
                    document.put(field, updated)?;
                }
                UpdateOperation::Push(_, item) => {
                    self.guard_id(document, field, None, is_insert)?;
                    let updated = push_value(field, &document.get_or_null(field), item)?;
                    document.put(field, updated)?;
                }
                UpdateOperation::Pull(_, item) => {
                    self.guard_id(document, field, None, is_insert)?;
                    if document.contains_key(field) {
                        let updated = pull_value(field, &document.get_or_null(field), item)?;
                        document.put(field, updated)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn guard_id(
        &self,
        document: &Document,
        field: &str,
        new_value: Option<&Value>,
        is_insert: bool,
    ) -> RepoResult<()> {
        if field != DOC_ID || is_insert {
            return Ok(());
        }
        let unchanged = matches!((document.id(), new_value), (Some(current), Some(new)) if current == new);
        if unchanged {
            return Ok(());
        }
        log::error!("Update would modify the immutable field _id");
        Err(RepoError::new(
            "Performing an update on the path '_id' would modify the immutable field '_id'",
            ErrorKind::BackendError,
        ))
    }
}

impl Display for UpdateDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut operators: Vec<&'static str> = Vec::new();
        for operation in &self.operations {
            if !operators.contains(&operation.operator()) {
                operators.push(operation.operator());
            }
        }

        write!(f, "{{")?;
        for (index, operator) in operators.iter().enumerate() {
            if index > 0 {
                write!(f, ",")?;
            }
            write!(f, " \"{}\": {{", operator)?;
            let entries = self.operations.iter().filter(|op| op.operator() == *operator);
            for (position, operation) in entries.enumerate() {
                if position > 0 {
                    write!(f, ",")?;
                }
                write!(f, " {:?}: {}", operation.field(), operation.value())?;
            }
            write!(f, " }}")?;
        }
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_apply_in_order() {
        let definition = UpdateDefinition::new()
            .add(UpdateOperation::Set("text".into(), Value::from("b")))
            .add(UpdateOperation::Inc("counter".into(), Value::I32(2)))
            .add(UpdateOperation::Inc("counter".into(), Value::I32(1)))
            .add(UpdateOperation::Push("history".into(), Value::I32(5)))
            .add(UpdateOperation::Pull("history".into(), Value::I32(1)));

        let mut document = doc! { "_id": 1, text: "a", counter: 1, history: [1, 2, 1] };
        definition.apply(&mut document, false).unwrap();
        assert_eq!(document.get("text"), Some(&Value::from("b")));
        assert_eq!(document.get("counter"), Some(&Value::I32(4)));
        assert_eq!(document.get("history"), Some(&Value::from(vec![2, 5])));
    }

    #[test]
    fn test_set_on_insert_only_on_insert() {
        let definition = UpdateDefinition::new()
            .add(UpdateOperation::SetOnInsert("created".into(), Value::Bool(true)));
        let mut existing = doc! { "_id": 1 };
        definition.apply(&mut existing, false).unwrap();
        assert!(!existing.contains_key("created"));

        let mut inserted = doc! { "_id": 2 };
        definition.apply(&mut inserted, true).unwrap();
        assert_eq!(inserted.get("created"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_pull_missing_field_is_noop() {
        let definition =
            UpdateDefinition::new().add(UpdateOperation::Pull("history".into(), Value::I32(1)));
        let mut document = doc! { "_id": 1 };
        definition.apply(&mut document, false).unwrap();
        assert_eq!(document, doc! { "_id": 1 });
    }

    #[test]
    fn test_id_is_immutable() {
        let definition =
            UpdateDefinition::new().add(UpdateOperation::Set("_id".into(), Value::I32(2)));
        let mut document = doc! { "_id": 1 };
        let err = definition.apply(&mut document, false).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::BackendError);

        let same =
            UpdateDefinition::new().add(UpdateOperation::Set("_id".into(), Value::I32(1)));
        assert!(same.apply(&mut document, false).is_ok());
    }

    #[test]
    fn test_increment_string_fails() {
        let definition =
            UpdateDefinition::new().add(UpdateOperation::Inc("text".into(), Value::I32(1)));
        let mut document = doc! { text: "a" };
        let err = definition.apply(&mut document, false).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_display_groups_by_operator() {
        let definition = UpdateDefinition::new()
            .add(UpdateOperation::Set("text".into(), Value::from("b")))
            .add(UpdateOperation::Inc("counter".into(), Value::I32(2)))
            .add(UpdateOperation::Set("flag".into(), Value::Bool(true)));
        assert_eq!(
            definition.to_string(),
            "{ \"$set\": { \"text\": \"b\", \"flag\": true }, \"$inc\": { \"counter\": 2 } }"
        );
        assert!(!definition.is_empty());
        assert!(UpdateDefinition::new().is_empty());
    }
}
