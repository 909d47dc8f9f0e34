use crate::errors::{ErrorKind, RepoError, RepoResult};
use crate::store::WriteFailure;
use crate::update::Updates;

/// Converts a zero-based page index and a page size into a number of records to skip.
///
/// # Errors
///
/// [ErrorKind::ValidationError] when `page_size < 1` or `page_index < 0`.
///
/// # Examples
///
/// ```rust,ignore
/// assert_eq!(to_skip(2, 10)?, 20);
/// ```
pub fn to_skip(page_index: i64, page_size: i64) -> RepoResult<u64> {
    if page_size < 1 {
        log::error!("Invalid page size {}", page_size);
        return Err(RepoError::new(
            &format!("pageSize should be greater than 0, got {}", page_size),
            ErrorKind::ValidationError,
        ));
    }
    if page_index < 0 {
        log::error!("Invalid page index {}", page_index);
        return Err(RepoError::new(
            &format!("pageIndex should not be negative, got {}", page_index),
            ErrorKind::ValidationError,
        ));
    }
    let skip = page_index.checked_mul(page_size).ok_or_else(|| {
        log::error!("Page {} of size {} is out of range", page_index, page_size);
        RepoError::new(
            &format!("Page {} of size {} is out of range", page_index, page_size),
            ErrorKind::ValidationError,
        )
    })?;
    Ok(skip as u64)
}

/// Rejects an update descriptor without intents.
pub(crate) fn require_updates<T>(updates: &Updates<T>) -> RepoResult<()> {
    if updates.is_empty() {
        log::error!("Update descriptor is empty");
        return Err(RepoError::new(
            "Update descriptor must contain at least one intent",
            ErrorKind::ValidationError,
        ));
    }
    Ok(())
}

/// Gives a uniqueness violation reported by a backend the
/// [ErrorKind::DuplicateKey] kind, keeping the backend error as its cause. Every
/// other error is returned unchanged.
pub(crate) fn map_write_error(operation: &str, err: RepoError) -> RepoError {
    if err.kind() == &ErrorKind::DuplicateKey || !err.is_duplicate_key() {
        return err;
    }
    RepoError::new_with_cause(
        &format!("Duplicate key violation during {}", operation),
        ErrorKind::DuplicateKey,
        err,
    )
}

/// Turns the failures of an unordered batch into one error, after the whole
/// batch ran.
pub(crate) fn batch_result(operation: &str, count: u64, failures: Vec<WriteFailure>) -> RepoResult<u64> {
    let total = failures.len();
    match failures.into_iter().next() {
        None => Ok(count),
        Some(first) => {
            log::warn!(
                "{} request(s) of {} failed, first at position {}",
                total,
                operation,
                first.index
            );
            let cause = map_write_error(operation, first.error);
            let kind = cause.kind().clone();
            Err(RepoError::new_with_cause(
                &format!(
                    "{} request(s) of {} failed, first at position {}; {} applied",
                    total, operation, first.index, count
                ),
                kind,
                cause,
            ))
        }
    }
}
