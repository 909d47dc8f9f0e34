use crate::common::{Document, ObjectId, Value};
use crate::errors::{ErrorKind, RepoError, RepoResult};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Converts a mapped field type to and from its stored [Value] form.
///
/// Every field registered in an entity mapping must implement this trait. Integers
/// accept any integer variant whose value fits, so an `I64` holding a small count
/// still reads back as `i32`.
pub trait Convertible: Sized {
    fn to_value(&self) -> RepoResult<Value>;
    fn from_value(value: &Value) -> RepoResult<Self>;
}

fn mismatch<T>(value: &Value, expected: &str) -> RepoResult<T> {
    log::error!("Value {} is not {}", value, expected);
    Err(RepoError::new(
        &format!("Value {} ({}) is not {}", value, value.type_name(), expected),
        ErrorKind::ObjectMappingError,
    ))
}

impl Convertible for bool {
    fn to_value(&self) -> RepoResult<Value> {
        Ok(Value::Bool(*self))
    }

    fn from_value(value: &Value) -> RepoResult<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            _ => mismatch(value, "a bool"),
        }
    }
}

impl Convertible for i32 {
    fn to_value(&self) -> RepoResult<Value> {
        Ok(Value::I32(*self))
    }

    fn from_value(value: &Value) -> RepoResult<Self> {
        match value.as_integer() {
            Some(i) => Ok(i32::try_from(i)?),
            None => mismatch(value, "an i32"),
        }
    }
}

impl Convertible for i64 {
    fn to_value(&self) -> RepoResult<Value> {
        Ok(Value::I64(*self))
    }

    fn from_value(value: &Value) -> RepoResult<Self> {
        match value.as_integer() {
            Some(i) => Ok(i64::try_from(i)?),
            None => mismatch(value, "an i64"),
        }
    }
}

impl Convertible for u32 {
    fn to_value(&self) -> RepoResult<Value> {
        Ok(Value::I64(*self as i64))
    }

    fn from_value(value: &Value) -> RepoResult<Self> {
        match value.as_integer() {
            Some(i) => Ok(u32::try_from(i)?),
            None => mismatch(value, "a u32"),
        }
    }
}

impl Convertible for f64 {
    fn to_value(&self) -> RepoResult<Value> {
        Ok(Value::F64(*self))
    }

    fn from_value(value: &Value) -> RepoResult<Self> {
        match value.as_decimal() {
            Some(f) => Ok(f),
            None => mismatch(value, "an f64"),
        }
    }
}

impl Convertible for String {
    fn to_value(&self) -> RepoResult<Value> {
        Ok(Value::String(self.clone()))
    }

    fn from_value(value: &Value) -> RepoResult<Self> {
        match value {
            Value::String(s) => Ok(s.clone()),
            _ => mismatch(value, "a string"),
        }
    }
}

impl Convertible for ObjectId {
    fn to_value(&self) -> RepoResult<Value> {
        Ok(Value::ObjectId(*self))
    }

    fn from_value(value: &Value) -> RepoResult<Self> {
        match value {
            Value::ObjectId(id) => Ok(*id),
            Value::String(hex) => ObjectId::parse_str(hex),
            _ => mismatch(value, "an object id"),
        }
    }
}

impl Convertible for DateTime<Utc> {
    fn to_value(&self) -> RepoResult<Value> {
        Ok(Value::DateTime(*self))
    }

    fn from_value(value: &Value) -> RepoResult<Self> {
        match value {
            Value::DateTime(dt) => Ok(*dt),
            _ => mismatch(value, "a date-time"),
        }
    }
}

/// Durations are persisted as a whole number of milliseconds.
///
/// Sub-millisecond precision is truncated on write, so a duration of 1.5ms reads
/// back as 1ms. Both repository backends store this truncated form.
impl Convertible for Duration {
    fn to_value(&self) -> RepoResult<Value> {
        let millis = i64::try_from(self.as_millis())?;
        Ok(Value::I64(millis))
    }

    fn from_value(value: &Value) -> RepoResult<Self> {
        match value.as_integer() {
            Some(millis) => Ok(Duration::from_millis(u64::try_from(millis)?)),
            None => mismatch(value, "a millisecond count"),
        }
    }
}

impl Convertible for Document {
    fn to_value(&self) -> RepoResult<Value> {
        Ok(Value::Document(self.clone()))
    }

    fn from_value(value: &Value) -> RepoResult<Self> {
        match value {
            Value::Document(doc) => Ok(doc.clone()),
            _ => mismatch(value, "a document"),
        }
    }
}

impl Convertible for Value {
    fn to_value(&self) -> RepoResult<Value> {
        Ok(self.clone())
    }

    fn from_value(value: &Value) -> RepoResult<Self> {
        Ok(value.clone())
    }
}

impl<T: Convertible> Convertible for Vec<T> {
    fn to_value(&self) -> RepoResult<Value> {
        let values = self
            .iter()
            .map(|item| item.to_value())
            .collect::<RepoResult<Vec<Value>>>()?;
        Ok(Value::Array(values))
    }

    /// A null value reads back as an empty list.
    fn from_value(value: &Value) -> RepoResult<Self> {
        match value {
            Value::Array(values) => values.iter().map(T::from_value).collect(),
            Value::Null => Ok(Vec::new()),
            _ => mismatch(value, "an array"),
        }
    }
}

impl<T: Convertible> Convertible for Option<T> {
    fn to_value(&self) -> RepoResult<Value> {
        match self {
            Some(v) => v.to_value(),
            None => Ok(Value::Null),
        }
    }

    fn from_value(value: &Value) -> RepoResult<Self> {
        match value {
            Value::Null => Ok(None),
            _ => Ok(Some(T::from_value(value)?)),
        }
    }
}
