use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic, Value, UNIQUE_INDEX_SUFFIX};

/// Marker carried by the message of every uniqueness-constraint violation raised
/// by a document store. Duplicate detection looks for it anywhere in the cause chain.
pub const DUPLICATE_KEY_MARKER: &str = "E11000 duplicate key";

/// Error kinds for repository operations.
///
/// Each kind describes one category of failure so callers can branch on the
/// category without parsing messages.
///
/// # Examples
///
/// ```rust,ignore
/// use docrepo::errors::{RepoError, ErrorKind, RepoResult};
///
/// fn example() -> RepoResult<()> {
///     Err(RepoError::new("pageSize should be greater than 0", ErrorKind::ValidationError))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// Invalid arguments or a missing identifier mapping. Raised before any backend call.
    ValidationError,
    /// A uniqueness constraint was violated.
    DuplicateKey,
    /// Any other failure reported by the underlying store.
    BackendError,
    /// The operation was abandoned because its cancellation token fired.
    Cancelled,
    /// The entity type has no identifier or the identifier value is unusable.
    NotIdentifiable,
    /// Error mapping an entity to or from its document form
    ObjectMappingError,
    /// A predicate could not be evaluated or translated
    FilterError,
    /// The operation is not valid for the current value or state
    InvalidOperation,
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::ValidationError => write!(f, "Validation error"),
            ErrorKind::DuplicateKey => write!(f, "Duplicate key"),
            ErrorKind::BackendError => write!(f, "Backend error"),
            ErrorKind::Cancelled => write!(f, "Operation cancelled"),
            ErrorKind::NotIdentifiable => write!(f, "Not identifiable"),
            ErrorKind::ObjectMappingError => write!(f, "Object mapping error"),
            ErrorKind::FilterError => write!(f, "Filter error"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Error type returned by every repository and store operation.
///
/// `RepoError` carries a message, a kind and an optional cause, so a failure
/// reported deep inside a store command keeps its original text while the
/// repository layer wraps it with its own context.
///
/// # Examples
///
/// ```rust,ignore
/// use docrepo::errors::{RepoError, ErrorKind};
///
/// let cause = RepoError::new("E11000 duplicate key error index: text_1", ErrorKind::DuplicateKey);
/// let err = RepoError::new_with_cause("Write operation failed", ErrorKind::BackendError, cause);
/// assert!(err.is_duplicate_key());
/// ```
#[derive(Clone)]
pub struct RepoError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<RepoError>>,
    backtrace: Atomic<Backtrace>,
}

impl RepoError {
    /// Creates a new `RepoError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        RepoError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new_unresolved()),
        }
    }

    /// Creates a new `RepoError` wrapping an underlying cause.
    ///
    /// # Arguments
    ///
    /// * `message` - A description of the error
    /// * `error_kind` - The category of error
    /// * `cause` - The underlying error that caused this error
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: RepoError) -> Self {
        RepoError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new_unresolved()),
        }
    }

    /// Creates the error every cancelled operation returns.
    pub fn cancelled(operation: &str) -> Self {
        log::debug!("Operation {} was cancelled", operation);
        RepoError::new(
            &format!("Operation {} was cancelled", operation),
            ErrorKind::Cancelled,
        )
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&RepoError> {
        self.cause.as_deref()
    }

    /// Iterates over this error followed by every error in its cause chain.
    pub fn chain(&self) -> impl Iterator<Item = &RepoError> {
        std::iter::successors(Some(self), |err| RepoError::cause(err))
    }

    /// Checks whether this error reports a uniqueness-constraint violation.
    ///
    /// True when the error itself is [ErrorKind::DuplicateKey] or when any error in the
    /// cause chain carries [DUPLICATE_KEY_MARKER] in its message.
    pub fn is_duplicate_key(&self) -> bool {
        self.chain().any(|err| {
            err.error_kind == ErrorKind::DuplicateKey || err.message.contains(DUPLICATE_KEY_MARKER)
        })
    }

    /// Checks whether this error reports a uniqueness-constraint violation on the
    /// index built over `field_name`.
    pub fn is_duplicate_key_on(&self, field_name: &str) -> bool {
        if field_name.is_empty() {
            return false;
        }
        let index_marker = format!("index: {}_1", field_name);
        self.chain().any(|err| {
            err.message.contains(DUPLICATE_KEY_MARKER) && err.message.contains(&index_marker)
        })
    }

    pub fn is_cancelled(&self) -> bool {
        self.error_kind == ErrorKind::Cancelled
    }

    pub fn is_validation(&self) -> bool {
        self.error_kind == ErrorKind::ValidationError
    }
}

/// Checks whether an error was raised because of a unique index constraint,
/// optionally restricted to the index over a specific field.
pub fn is_duplicate_key(error: &RepoError, field_name: Option<&str>) -> bool {
    match field_name {
        Some(field_name) => error.is_duplicate_key_on(field_name),
        None => error.is_duplicate_key(),
    }
}

/// Builds the error a store reports when a write violates the unique index on `field_name`.
///
/// The cause carries [DUPLICATE_KEY_MARKER] together with the namespace, the index
/// and the offending value, so [RepoError::is_duplicate_key_on] can identify the field.
pub fn duplicate_key_error(namespace: &str, field_name: &str, value: &Value) -> RepoError {
    let detail = format!(
        "{} error collection: {} index: {}{} dup key: {{ {}: {} }}",
        DUPLICATE_KEY_MARKER, namespace, field_name, UNIQUE_INDEX_SUFFIX, field_name, value
    );
    log::error!("{}", detail);
    RepoError::new_with_cause(
        "Write operation failed",
        ErrorKind::BackendError,
        RepoError::new(&detail, ErrorKind::DuplicateKey),
    )
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => {
                let mut backtrace = self.backtrace.write();
                backtrace.resolve();
                write!(f, "{}\n{:?}", self.message, *backtrace)
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for repository operations.
pub type RepoResult<T> = Result<T, RepoError>;

impl From<regex::Error> for RepoError {
    fn from(err: regex::Error) -> Self {
        RepoError::new(
            &format!("Invalid regular expression: {}", err),
            ErrorKind::FilterError,
        )
    }
}

impl From<std::num::TryFromIntError> for RepoError {
    fn from(err: std::num::TryFromIntError) -> Self {
        RepoError::new(
            &format!("Integer conversion error: {}", err),
            ErrorKind::ObjectMappingError,
        )
    }
}

impl From<String> for RepoError {
    fn from(msg: String) -> Self {
        RepoError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for RepoError {
    fn from(msg: &str) -> Self {
        RepoError::new(msg, ErrorKind::InternalError)
    }
}
