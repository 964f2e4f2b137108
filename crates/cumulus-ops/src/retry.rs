//! Backoff for idempotent reads.

use tracing::warn;

use cumulus_core::{DirectoryListing, FileDataPort, PortResult, RetryPolicy};

/// List a directory, retrying transient failures with exponential backoff.
///
/// Only [`PortError::is_retryable`](cumulus_core::PortError::is_retryable)
/// errors are retried; everything else is returned immediately.
pub async fn list_with_retry(
    port: &dyn FileDataPort,
    path: &str,
    policy: &RetryPolicy,
) -> PortResult<DirectoryListing> {
    let mut attempt = 1;
    loop {
        match port.list_directory(path).await {
            Ok(listing) => return Ok(listing),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(path, attempt, error = %e, "Listing failed, retrying in {:?}", delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
