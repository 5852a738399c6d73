use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Runs `fut` with a deadline. On expiry the future is dropped, which aborts the
/// in-flight request without leaving partial writes behind (every store write is a
/// single statement).
pub async fn with_timeout<T, E, F>(limit: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    Error: From<E>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(Error::from),
        Err(_) => Err(Error::Timeout(format!("{} exceeded {:?}", what, limit))),
    }
}
