//! Retry - Bounded retry of operations failing with transient errors
//!
//! Some API errors are expected right after a related change (an IAM role that
//! has not propagated yet, a conflicting operation still in flight). These are
//! matched by [`RetryableError`] patterns and retried with exponential backoff
//! until either the attempt budget or the time budget runs out. Anything that
//! does not match surfaces on the first failure.

use std::future::Future;
use std::time::Duration;

use log::debug;
use tokio::time::{Instant, sleep};

use crate::provider::{ProviderError, ProviderResult};
use crate::timeouts::deadline_after;

/// Budget for a retried operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total time allowed across all attempts
    pub timeout: Duration,
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            max_attempts: 25,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }
}

/// Run `op` until it succeeds, fails with an error `retryable` rejects, or the
/// policy's budget is spent. The last error is returned unchanged.
pub async fn retry_when<T, F, Fut, P>(
    policy: &RetryPolicy,
    mut op: F,
    mut retryable: P,
) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
    P: FnMut(&ProviderError) -> bool,
{
    let deadline = deadline_after(policy.timeout);
    let mut delay = policy.initial_delay;
    let mut attempt = 1u32;

    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !retryable(&err) {
            return Err(err);
        }
        if attempt >= policy.max_attempts {
            debug!("giving up after {} attempts: {}", attempt, err);
            return Err(err);
        }
        let now = Instant::now();
        if now >= deadline {
            debug!("giving up after {:?}: {}", policy.timeout, err);
            return Err(err);
        }

        debug!(
            "retryable error (attempt {}/{}), retrying in {:?}: {}",
            attempt, policy.max_attempts, delay, err
        );
        sleep(delay.min(deadline - now)).await;

        attempt += 1;
        delay = delay.saturating_mul(2).min(policy.max_delay);
    }
}

/// Pattern of an error worth retrying
///
/// A pattern with a code only matches errors with that code. The message
/// matches by substring; an empty message matches any message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryableError {
    pub code: Option<String>,
    pub message: String,
}

impl RetryableError {
    pub fn code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: String::new(),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn code_and_message(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    pub fn matches(&self, err: &ProviderError) -> bool {
        let code_matches = match self.code {
            Some(ref code) => err.code() == Some(code.as_str()),
            None => true,
        };
        code_matches && err.message_contains(&self.message)
    }
}

/// Retry while the error matches one of `patterns`
pub async fn retry_when_message_contains<T, F, Fut>(
    policy: &RetryPolicy,
    op: F,
    patterns: &[RetryableError],
) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    retry_when(policy, op, |err| patterns.iter().any(|p| p.matches(err))).await
}

/// Retry while the object is not found yet, as happens right after a create
pub async fn retry_when_not_found<T, F, Fut>(policy: &RetryPolicy, op: F) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    retry_when(policy, op, ProviderError::is_not_found).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fails_then_succeeds(
        failures: u32,
        error: fn() -> ProviderError,
        calls: Arc<AtomicU32>,
    ) -> impl FnMut() -> std::future::Ready<ProviderResult<u32>> {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= failures {
                std::future::ready(Err(error()))
            } else {
                std::future::ready(Ok(n))
            }
        }
    }

    fn role_not_assumable() -> ProviderError {
        ProviderError::api(
            "InvalidParameterValueException",
            "The role defined for the function cannot be assumed by Lambda.",
        )
    }

    #[tokio::test(start_paused = true)]
    async fn retries_matching_errors_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let patterns = [RetryableError::message("cannot be assumed by Lambda")];

        let result = retry_when_message_contains(
            &RetryPolicy::default(),
            fails_then_succeeds(3, role_not_assumable, calls.clone()),
            &patterns,
        )
        .await
        .unwrap();

        assert_eq!(result, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn non_matching_error_surfaces_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let patterns = [RetryableError::code("ResourceConflict")];

        let err = retry_when_message_contains(
            &RetryPolicy::default(),
            fails_then_succeeds(3, role_not_assumable, calls.clone()),
            &patterns,
        )
        .await
        .unwrap_err();

        assert_eq!(err.code(), Some("InvalidParameterValueException"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_budget_is_bounded() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::default().with_max_attempts(3);

        let err = retry_when(
            &policy,
            fails_then_succeeds(10, role_not_assumable, calls.clone()),
            |_| true,
        )
        .await
        .unwrap_err();

        assert!(err.message_contains("cannot be assumed"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn time_budget_is_bounded() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(Duration::from_secs(5))
            .with_initial_delay(Duration::from_secs(2))
            .with_max_delay(Duration::from_secs(2));

        let start = Instant::now();
        let result = retry_when(
            &policy,
            fails_then_succeeds(100, role_not_assumable, calls.clone()),
            |_| true,
        )
        .await;

        assert!(result.is_err());
        // Attempts at 0s, 2s, 4s and 5s
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_time_budget_falls_back_to_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(Duration::MAX).with_max_attempts(4);

        let err = retry_when(
            &policy,
            fails_then_succeeds(10, role_not_assumable, calls.clone()),
            |_| true,
        )
        .await
        .unwrap_err();

        assert!(err.message_contains("cannot be assumed"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_is_retried_after_create() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = retry_when_not_found(
            &RetryPolicy::default(),
            fails_then_succeeds(2, || ProviderError::not_found("no such role"), calls),
        )
        .await
        .unwrap();
        assert_eq!(result, 3);
    }

    #[test]
    fn pattern_matching() {
        let err = ProviderError::api("ResourceConflict", "Another operation is in progress");
        assert!(RetryableError::code("ResourceConflict").matches(&err));
        assert!(RetryableError::message("in progress").matches(&err));
        assert!(RetryableError::code_and_message("ResourceConflict", "operation").matches(&err));
        assert!(!RetryableError::code_and_message("Throttling", "operation").matches(&err));
        assert!(!RetryableError::message("cannot be assumed").matches(&err));
    }
}
