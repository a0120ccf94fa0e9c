//! Bounded retry for transient failures

use std::future::Future;

use crate::config::RetryPolicy;
use crate::error::FlowError;

/// Run `op` until it succeeds, fails permanently, or attempts run out.
///
/// Only transport failures are retried; `op` receives the 1-based attempt
/// number.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T, FlowError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FlowError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = policy.backoff(attempt);
                log::warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    what,
                    attempt,
                    max_attempts,
                    delay,
                    err
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                log::error!("{} failed after {} attempt(s): {}", what, attempt, err);
                return Err(err);
            }
        }
    }
}
