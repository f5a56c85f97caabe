//! Exponential-backoff retry policy
//!
//! Single wrapper for every stage that calls the flaky text-generation API.
//! Transient failures back off with doubling delays; non-transient failures
//! give up immediately. Callers that require the value treat `None` as a
//! stage failure; callers that can tolerate a gap substitute a placeholder
//! and continue.

use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use clippings_client::ClientError;
use clippings_core::domain::progress::EventType;

use crate::service::progress::ProgressReporter;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    max_attempts: u32,
    /// First backoff delay; doubles on every retry
    initial_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
        }
    }

    /// Run `op`, retrying transient failures with exponential backoff
    ///
    /// Each retry is recorded on the progress log. Returns `None` on a
    /// non-transient error or once attempts are exhausted.
    pub async fn run<T, F, Fut>(
        &self,
        label: &str,
        reporter: &dyn ProgressReporter,
        mut op: F,
    ) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut delay = self.initial_delay;

        for attempt in 1..=self.max_attempts {
            match op().await {
                Ok(value) => return Some(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        "{label}: attempt {attempt}/{} failed ({err}), retrying in {:?}",
                        self.max_attempts, delay
                    );
                    reporter
                        .report_event(
                            EventType::Retry,
                            &format!(
                                "{label}: attempt {attempt}/{} failed, retrying in {}s",
                                self.max_attempts,
                                delay.as_secs()
                            ),
                            None,
                        )
                        .await;
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(err) if err.is_transient() => {
                    error!(
                        "{label}: giving up after {} attempts: {err}",
                        self.max_attempts
                    );
                    return None;
                }
                Err(err) => {
                    error!("{label}: non-transient error, not retrying: {err}");
                    return None;
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::progress::NoopReporter;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> ClientError {
        ClientError::api_error(503, "unavailable")
    }

    fn permanent() -> ClientError {
        ClientError::api_error(400, "bad request")
    }

    #[tokio::test(start_paused = true)]
    async fn test_flaky_op_succeeds_after_backoff() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let calls = Arc::new(AtomicU32::new(0));
        let started = tokio::time::Instant::now();

        let result = {
            let calls = Arc::clone(&calls);
            policy
                .run("test op", &NoopReporter, move || {
                    let calls = Arc::clone(&calls);
                    async move {
                        if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                            Err(transient())
                        } else {
                            Ok(42)
                        }
                    }
                })
                .await
        };

        assert_eq!(result, Some(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // Two backoff sleeps: 1s + 2s, strictly less than the next doubling
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_error_fails_fast() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let calls = Arc::new(AtomicU32::new(0));
        let started = tokio::time::Instant::now();

        let result: Option<u32> = {
            let calls = Arc::clone(&calls);
            policy
                .run("test op", &NoopReporter, move || {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(permanent())
                    }
                })
                .await
        };

        assert_eq!(result, None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_attempts_return_none() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let calls = Arc::new(AtomicU32::new(0));

        let result: Option<u32> = {
            let calls = Arc::clone(&calls);
            policy
                .run("test op", &NoopReporter, move || {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(transient())
                    }
                })
                .await
        };

        assert_eq!(result, None);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
