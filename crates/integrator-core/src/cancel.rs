//! Cancellation of outstanding external calls.

use crate::{Error, Result};
use std::future::Future;

pub use tokio_util::sync::CancellationToken;

/// Run `fut` unless `token` fires first, in which case the call is dropped
/// and `Error::Cancelled` is returned.
pub async fn cancellable<F, T>(token: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Error::Cancelled),
        res = fut => res,
    }
}
