use crate::common::{Value, DOC_ID};
use crate::errors::{ErrorKind, RepoError, RepoResult};
use im::OrdMap;
use std::fmt::{Debug, Display, Formatter};

/// A schemaless record: an ordered map of field names to [Value]s.
///
/// Documents are what the store persists and what the predicate and update
/// machinery operates on. The identifier of a stored document lives under the
/// reserved `_id` field.
///
/// ## Cheap clones
///
/// The fields are kept in an `im::OrdMap`, so cloning a document is O(1) and every
/// clone mutates independently. Stores hand out clones of stored documents freely.
#[derive(Clone, Eq, PartialEq, Hash, Default, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Document {
    data: OrdMap<String, Value>,
}

impl Document {
    /// Creates a new empty document.
    pub fn new() -> Self {
        Document {
            data: OrdMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Associates the specified [Value] with the specified key in this document.
    ///
    /// # Arguments
    ///
    /// * `key` - The field name. Cannot be empty.
    /// * `value` - Anything convertible into a [Value].
    ///
    /// # Errors
    ///
    /// Returns [ErrorKind::InvalidOperation] if the key is empty.
    pub fn put<T: Into<Value>>(&mut self, key: &str, value: T) -> RepoResult<()> {
        if key.is_empty() {
            log::error!("Document does not support empty key");
            return Err(RepoError::new(
                "Document does not support empty key",
                ErrorKind::InvalidOperation,
            ));
        }
        self.data.insert(key.to_string(), value.into());
        Ok(())
    }

    #[doc(hidden)]
    pub fn insert_raw(&mut self, key: String, value: Value) {
        self.data.insert(key, value);
    }

    /// Returns the value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Returns the value stored under `key`, reading a missing field as `Null`.
    pub fn get_or_null(&self, key: &str) -> Value {
        self.data.get(key).cloned().unwrap_or_default()
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.data.get_mut(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Returns the identifier stored under `_id`, if any.
    pub fn id(&self) -> Option<&Value> {
        self.data.get(DOC_ID).filter(|id| !id.is_null())
    }

    pub fn has_id(&self) -> bool {
        self.id().is_some()
    }

    /// Returns the field names of this document in key order.
    pub fn fields(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.data.is_empty() {
            return write!(f, "{{}}");
        }
        write!(f, "{{ ")?;
        for (index, (key, value)) in self.data.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}: {}", key, value)?;
        }
        write!(f, " }}")
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Document {}", self)
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Document {
            data: iter.into_iter().collect(),
        }
    }
}

pub fn normalize(value: &str) -> String {
    value.trim_matches('"').to_string()
}

/// Creates a [Document] with JSON-like syntax.
///
/// # Examples
///
/// ```rust
/// use docrepo::doc;
///
/// let empty = doc!{};
///
/// let post = doc!{
///     text: "hello",
///     counter: 1,
///     history: [1, 2, 3],
///     author: { name: "Alice" }
/// };
/// assert_eq!(post.size(), 4);
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::common::Document::new()
    };

    ($($key:tt : $value:tt),* $(,)?) => {
        {
            #[allow(unused_imports)]
            use $crate::doc_value;

            let mut doc = $crate::common::Document::new();
            $(
                doc.insert_raw($crate::common::normalize(stringify!($key)), $crate::doc_value!($value));
            )*
            doc
        }
    };
}

/// Helper macro to convert values for the doc! macro.
#[macro_export]
macro_rules! doc_value {
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::common::Value::Document($crate::doc!{ $($key : $value),* })
    };

    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}
