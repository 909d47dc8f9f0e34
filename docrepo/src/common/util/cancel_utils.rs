use crate::errors::{RepoError, RepoResult};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Fails with [crate::errors::ErrorKind::Cancelled] if the token has already fired.
pub fn check_cancelled(token: &CancellationToken, operation: &str) -> RepoResult<()> {
    if token.is_cancelled() {
        return Err(RepoError::cancelled(operation));
    }
    Ok(())
}

/// Awaits `future` unless the token fires first.
///
/// A token that is already cancelled wins before the future is polled. Once the
/// token fires the future is dropped and the operation reports cancellation.
pub async fn run_cancellable<F, T>(
    token: &CancellationToken,
    operation: &str,
    future: F,
) -> RepoResult<T>
where
    F: Future<Output = RepoResult<T>>,
{
    check_cancelled(token, operation)?;
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(RepoError::cancelled(operation)),
        result = future => result,
    }
}
