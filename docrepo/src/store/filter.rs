use crate::common::{matches_comparison, matches_eq, matches_in, Comparison, Document, TextPattern, Value};
use crate::errors::RepoResult;
use itertools::Itertools;
use std::fmt::{Display, Formatter};

/// A native document filter understood by a [crate::store::DocumentCollection].
///
/// Field names are document element names. Missing fields read as `Null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document.
    All,
    Eq(String, Value),
    Ne(String, Value),
    Compare(String, Comparison, Value),
    In(String, Vec<Value>),
    Nin(String, Vec<Value>),
    Regex(String, TextPattern),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn eq<T: Into<Value>>(field: &str, value: T) -> Filter {
        Filter::Eq(field.to_string(), value.into())
    }

    pub fn by_id<T: Into<Value>>(id: T) -> Filter {
        Filter::Eq(crate::common::DOC_ID.to_string(), id.into())
    }

    /// Matches nothing.
    pub fn none() -> Filter {
        Filter::Not(Box::new(Filter::All))
    }

    /// Evaluates the filter against a document.
    ///
    /// # Errors
    ///
    /// Fails with [crate::errors::ErrorKind::FilterError] for an invalid regular expression.
    pub fn apply(&self, document: &Document) -> RepoResult<bool> {
        match self {
            Filter::All => Ok(true),
            Filter::Eq(field, value) => Ok(matches_eq(&document.get_or_null(field), value)),
            Filter::Ne(field, value) => Ok(!matches_eq(&document.get_or_null(field), value)),
            Filter::Compare(field, comparison, value) => Ok(matches_comparison(
                &document.get_or_null(field),
                *comparison,
                value,
            )),
            Filter::In(field, values) => Ok(matches_in(&document.get_or_null(field), values)),
            Filter::Nin(field, values) => Ok(!matches_in(&document.get_or_null(field), values)),
            Filter::Regex(field, pattern) => pattern.matches(&document.get_or_null(field)),
            Filter::And(filters) => {
                for filter in filters {
                    if !filter.apply(document)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Filter::Or(filters) => {
                for filter in filters {
                    if filter.apply(document)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Filter::Not(filter) => Ok(!filter.apply(document)?),
        }
    }

    /// Collects the top-level equality terms of the filter.
    ///
    /// These seed the document created by an upsert when nothing matched.
    pub fn equality_terms(&self) -> Vec<(String, Value)> {
        match self {
            Filter::Eq(field, value) => vec![(field.clone(), value.clone())],
            Filter::And(filters) => filters.iter().flat_map(|f| f.equality_terms()).collect(),
            _ => Vec::new(),
        }
    }
}

impl Display for Filter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Filter::All => write!(f, "{{}}"),
            Filter::Eq(field, value) => write!(f, "{{ {:?}: {} }}", field, value),
            Filter::Ne(field, value) => write!(f, "{{ {:?}: {{ \"$ne\": {} }} }}", field, value),
            Filter::Compare(field, comparison, value) => write!(
                f,
                "{{ {:?}: {{ \"{}\": {} }} }}",
                field,
                comparison.operator(),
                value
            ),
            Filter::In(field, values) => {
                write!(f, "{{ {:?}: {{ \"$in\": [{}] }} }}", field, values.iter().join(", "))
            }
            Filter::Nin(field, values) => {
                write!(f, "{{ {:?}: {{ \"$nin\": [{}] }} }}", field, values.iter().join(", "))
            }
            Filter::Regex(field, pattern) => write!(f, "{{ {:?}: /{}/ }}", field, pattern),
            Filter::And(filters) => write!(f, "{{ \"$and\": [{}] }}", filters.iter().join(", ")),
            Filter::Or(filters) => write!(f, "{{ \"$or\": [{}] }}", filters.iter().join(", ")),
            Filter::Not(filter) => write!(f, "{{ \"$nor\": [{}] }}", filter),
        }
    }
}
