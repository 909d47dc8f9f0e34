use crate::common::{matches_regex, Value};
use crate::errors::RepoResult;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::fmt::{Display, Formatter};

/// A regular expression kept with its source text and compiled at most once.
///
/// Compilation happens on first use and the outcome is shared by every clone made
/// afterwards, so a predicate or filter scanning many records compiles its pattern
/// a single time. Two patterns are equal when their sources are.
#[derive(Debug, Clone)]
pub struct TextPattern {
    source: String,
    compiled: OnceCell<Result<Regex, regex::Error>>,
}

impl TextPattern {
    pub fn new(source: &str) -> Self {
        TextPattern {
            source: source.to_string(),
            compiled: OnceCell::new(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The compiled expression.
    ///
    /// # Errors
    ///
    /// [crate::errors::ErrorKind::FilterError] when the source is not a valid pattern.
    pub fn regex(&self) -> RepoResult<&Regex> {
        match self.compiled.get_or_init(|| Regex::new(&self.source)) {
            Ok(regex) => Ok(regex),
            Err(err) => {
                log::error!("Invalid regular expression {}", self.source);
                Err(err.clone().into())
            }
        }
    }

    /// Matches a string value, or any string element of an array value.
    pub fn matches(&self, value: &Value) -> RepoResult<bool> {
        Ok(matches_regex(value, self.regex()?))
    }

    /// Whether the source has been compiled yet.
    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }
}

impl PartialEq for TextPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Display for TextPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl From<&str> for TextPattern {
    fn from(source: &str) -> Self {
        TextPattern::new(source)
    }
}

impl From<String> for TextPattern {
    fn from(source: String) -> Self {
        TextPattern {
            source,
            compiled: OnceCell::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::val;

    #[test]
    fn test_compiles_once_and_clones_share_it() {
        let pattern = TextPattern::new("^po");
        assert!(!pattern.is_compiled());
        assert!(pattern.matches(&val!("post")).unwrap());
        assert!(pattern.is_compiled());

        let copy = pattern.clone();
        assert!(copy.is_compiled());
        let first = pattern.regex().unwrap() as *const Regex;
        let again = pattern.regex().unwrap() as *const Regex;
        assert_eq!(first, again);
        assert!(!copy.matches(&val!("top")).unwrap());
    }

    #[test]
    fn test_invalid_source_fails_every_use() {
        let pattern = TextPattern::new("(");
        assert_eq!(pattern.regex().unwrap_err().kind(), &ErrorKind::FilterError);
        assert_eq!(
            pattern.matches(&val!("x")).unwrap_err().kind(),
            &ErrorKind::FilterError
        );
    }

    #[test]
    fn test_equality_and_display_use_source() {
        let compiled = TextPattern::new("^a");
        compiled.regex().unwrap();
        assert_eq!(compiled, TextPattern::from("^a"));
        assert_ne!(compiled, TextPattern::from("^b".to_string()));
        assert_eq!(compiled.to_string(), "^a");
        assert_eq!(compiled.source(), "^a");
    }
}
