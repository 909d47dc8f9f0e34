use crate::common::Value;
use crate::errors::{ErrorKind, RepoError, RepoResult};
use regex::Regex;
use std::cmp::Ordering;

/// Ordering comparison between a field value and an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    pub fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            Comparison::Gt => ordering == Ordering::Greater,
            Comparison::Gte => ordering != Ordering::Less,
            Comparison::Lt => ordering == Ordering::Less,
            Comparison::Lte => ordering != Ordering::Greater,
        }
    }

    /// The comparison that holds when the operands are swapped.
    pub fn flip(&self) -> Comparison {
        match self {
            Comparison::Gt => Comparison::Lt,
            Comparison::Gte => Comparison::Lte,
            Comparison::Lt => Comparison::Gt,
            Comparison::Lte => Comparison::Gte,
        }
    }

    pub fn operator(&self) -> &'static str {
        match self {
            Comparison::Gt => "$gt",
            Comparison::Gte => "$gte",
            Comparison::Lt => "$lt",
            Comparison::Lte => "$lte",
        }
    }
}

/// Equality match of a stored field value against an operand.
///
/// A field holding an array matches a non-array operand when any element is equal.
pub fn matches_eq(field_value: &Value, operand: &Value) -> bool {
    if field_value == operand {
        return true;
    }
    match field_value {
        Value::Array(items) if !operand.is_array() => items.iter().any(|item| item == operand),
        _ => false,
    }
}

/// Membership match: true when [matches_eq] holds for any of the candidates.
pub fn matches_in(field_value: &Value, candidates: &[Value]) -> bool {
    candidates
        .iter()
        .any(|candidate| matches_eq(field_value, candidate))
}

/// Ordering match. Values of different type classes never match.
pub fn matches_comparison(field_value: &Value, comparison: Comparison, operand: &Value) -> bool {
    if let Value::Array(items) = field_value {
        if !operand.is_array() {
            return items
                .iter()
                .any(|item| compare_same_class(item, comparison, operand));
        }
    }
    compare_same_class(field_value, comparison, operand)
}

fn compare_same_class(left: &Value, comparison: Comparison, right: &Value) -> bool {
    if left.type_class() != right.type_class() {
        return false;
    }
    comparison.accepts(left.cmp(right))
}

/// Regular expression match against a string field, or any string element of an array field.
pub fn matches_regex(field_value: &Value, regex: &Regex) -> bool {
    match field_value {
        Value::String(s) => regex.is_match(s),
        Value::Array(items) => items
            .iter()
            .any(|item| item.as_string().map_or(false, |s| regex.is_match(s))),
        _ => false,
    }
}

/// Adds `delta` to `current`.
///
/// A null current value counts as zero. An integer sum keeps the width of the
/// current value and fails with `InvalidOperation` when it does not fit. Any float
/// operand makes the result a float.
pub fn increment_value(field_name: &str, current: &Value, delta: &Value) -> RepoResult<Value> {
    if !delta.is_number() {
        log::error!("Cannot increment {} with non-numeric argument {}", field_name, delta);
        return Err(RepoError::new(
            &format!(
                "Cannot increment field '{}' with non-numeric argument {}",
                field_name, delta
            ),
            ErrorKind::InvalidOperation,
        ));
    }

    match (current, delta) {
        (Value::Null, _) => Ok(delta.clone()),
        (Value::I32(a), b) if b.is_integer() => i64::from(*a)
            .checked_add(integer_of(b))
            .and_then(|sum| i32::try_from(sum).ok())
            .map(Value::I32)
            .ok_or_else(|| overflow_error(field_name)),
        (Value::I64(a), b) if b.is_integer() => a
            .checked_add(integer_of(b))
            .map(Value::I64)
            .ok_or_else(|| overflow_error(field_name)),
        (a, b) if a.is_number() => {
            let sum = a.as_decimal().unwrap_or_default() + b.as_decimal().unwrap_or_default();
            Ok(Value::F64(sum))
        }
        _ => {
            log::error!("Cannot increment non-numeric field {} holding {}", field_name, current);
            Err(RepoError::new(
                &format!(
                    "Cannot apply increment to field '{}' of non-numeric type {}",
                    field_name,
                    current.type_name()
                ),
                ErrorKind::InvalidOperation,
            ))
        }
    }
}

fn overflow_error(field_name: &str) -> RepoError {
    log::error!("Integer overflow incrementing {}", field_name);
    RepoError::new(
        &format!("Integer overflow incrementing field '{}'", field_name),
        ErrorKind::InvalidOperation,
    )
}

fn integer_of(value: &Value) -> i64 {
    match value {
        Value::I32(v) => *v as i64,
        Value::I64(v) => *v,
        _ => 0,
    }
}

/// Appends `item` to an array value. A null current value becomes a one-element array.
pub fn push_value(field_name: &str, current: &Value, item: &Value) -> RepoResult<Value> {
    match current {
        Value::Null => Ok(Value::Array(vec![item.clone()])),
        Value::Array(items) => {
            let mut items = items.clone();
            items.push(item.clone());
            Ok(Value::Array(items))
        }
        _ => {
            log::error!("Cannot push to non-array field {}", field_name);
            Err(RepoError::new(
                &format!(
                    "The field '{}' must be an array but is of type {}",
                    field_name,
                    current.type_name()
                ),
                ErrorKind::InvalidOperation,
            ))
        }
    }
}

/// Removes every element equal to `item` from an array value. A null current value is left as is.
pub fn pull_value(field_name: &str, current: &Value, item: &Value) -> RepoResult<Value> {
    match current {
        Value::Null => Ok(Value::Null),
        Value::Array(items) => Ok(Value::Array(
            items.iter().filter(|x| *x != item).cloned().collect(),
        )),
        _ => {
            log::error!("Cannot pull from non-array field {}", field_name);
            Err(RepoError::new(
                &format!(
                    "Cannot apply $pull to field '{}' of non-array type {}",
                    field_name,
                    current.type_name()
                ),
                ErrorKind::InvalidOperation,
            ))
        }
    }
}
