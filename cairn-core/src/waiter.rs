//! Waiter - Poll a remote object until its status reaches a target
//!
//! A [`StateChangeConf`] describes which statuses mean "still in progress"
//! and which mean "done". [`StateChangeConf::wait_for_state`] drives a refresh
//! function until one of these happens:
//!
//! - the status lands in the target set (the object is returned),
//! - the refresh function fails (its error is returned as-is),
//! - the status is neither pending nor target (unexpected state),
//! - the object stays missing for too long (not found),
//! - the timeout elapses (timeout).
//!
//! A missing object is an empty status. It counts as reaching the target only
//! when the target set is empty, which is how delete waiters are expressed.
//!
//! Waiters hold no state between calls; dropping the future cancels the wait.

use std::future::Future;
use std::time::Duration;

use log::{debug, trace};
use thiserror::Error;
use tokio::time::{Instant, sleep, sleep_until, timeout_at};

use crate::provider::{ProviderError, ProviderResult};
use crate::timeouts::deadline_from;

/// Consecutive "not found" refreshes tolerated while waiting for a non-empty target
pub const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

const INITIAL_WAIT: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(10);
/// Poll intervals at or above this are ignored in favor of the backoff
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(180);

/// Result of one refresh: the object and its status, or `None` when it does not exist
pub type Refreshed<T> = Option<(T, String)>;

/// Errors terminating a wait
#[derive(Debug, Error)]
pub enum WaitError {
    #[error(
        "timeout while waiting for state to become '{}' (last state: '{last_state}', timeout: {timeout:?})",
        expected.join(", ")
    )]
    Timeout {
        last_state: String,
        expected: Vec<String>,
        timeout: Duration,
    },

    #[error("unexpected state '{state}', wanted target '{}'", expected.join(", "))]
    UnexpectedState { state: String, expected: Vec<String> },

    #[error("couldn't find resource ({retries} retries)")]
    NotFound { retries: u32 },

    #[error(transparent)]
    Refresh(ProviderError),
}

impl From<WaitError> for ProviderError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::Refresh(e) => e,
            e @ WaitError::Timeout { .. } => ProviderError::timeout(e.to_string()).with_cause(e),
            e @ WaitError::NotFound { .. } => ProviderError::not_found(e.to_string()).with_cause(e),
            e @ WaitError::UnexpectedState { .. } => ProviderError::new(e.to_string()).with_cause(e),
        }
    }
}

/// Configuration of a single wait
#[derive(Debug, Clone)]
pub struct StateChangeConf {
    /// Statuses meaning "still in progress"
    pub pending: Vec<String>,
    /// Statuses meaning "done"; empty means "wait until the object is gone"
    pub target: Vec<String>,
    /// Total budget, including the initial delay
    pub timeout: Duration,
    /// Wait before the first refresh
    pub delay: Duration,
    /// Lower bound of the backoff between refreshes
    pub min_timeout: Duration,
    /// Fixed interval between refreshes, replacing the backoff
    pub poll_interval: Option<Duration>,
    /// Consecutive "not found" refreshes tolerated when the target is not empty
    pub not_found_checks: u32,
    /// Consecutive target observations required before succeeding
    pub continuous_target_occurrence: u32,
}

impl StateChangeConf {
    pub fn new<P, T>(pending: P, target: T, timeout: Duration) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            pending: pending.into_iter().map(Into::into).collect(),
            target: target.into_iter().map(Into::into).collect(),
            timeout,
            delay: Duration::ZERO,
            min_timeout: Duration::ZERO,
            poll_interval: None,
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
            continuous_target_occurrence: 1,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn with_not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    pub fn with_continuous_target_occurrence(mut self, occurrence: u32) -> Self {
        self.continuous_target_occurrence = occurrence.max(1);
        self
    }

    /// Poll `refresh` until the status reaches the target set.
    ///
    /// Returns `Some(object)` on reaching a target status, or `None` when the
    /// target set is empty and the object disappeared.
    pub async fn wait_for_state<T, F, Fut>(&self, mut refresh: F) -> Result<Option<T>, WaitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<Refreshed<T>>>,
    {
        let start = Instant::now();
        let deadline = deadline_from(start, self.timeout);

        if !self.delay.is_zero() {
            sleep_until(deadline_from(start, self.delay).min(deadline)).await;
        }

        let mut wait = INITIAL_WAIT;
        let mut not_found_ticks = 0u32;
        let mut target_occurrence = 0u32;
        let mut last_state = String::new();

        loop {
            if Instant::now() >= deadline {
                return Err(self.timeout_error(last_state));
            }

            let refreshed = match timeout_at(deadline, refresh()).await {
                Ok(result) => result.map_err(WaitError::Refresh)?,
                Err(_) => return Err(self.timeout_error(last_state)),
            };

            match refreshed {
                None if self.target.is_empty() => {
                    last_state.clear();
                    target_occurrence += 1;
                    if target_occurrence >= self.continuous_target_occurrence {
                        debug!("object is gone, wait complete");
                        return Ok(None);
                    }
                }
                None => {
                    last_state.clear();
                    target_occurrence = 0;
                    not_found_ticks += 1;
                    debug!(
                        "object not found ({}/{}), waiting for {:?}",
                        not_found_ticks, self.not_found_checks, self.target
                    );
                    if not_found_ticks > self.not_found_checks {
                        return Err(WaitError::NotFound {
                            retries: not_found_ticks,
                        });
                    }
                }
                Some((object, state)) => {
                    not_found_ticks = 0;
                    debug!("current state '{}', waiting for {:?}", state, self.target);

                    if self.target.contains(&state) {
                        target_occurrence += 1;
                        if target_occurrence >= self.continuous_target_occurrence {
                            return Ok(Some(object));
                        }
                    } else if self.pending.contains(&state) {
                        target_occurrence = 0;
                    } else if !self.pending.is_empty() {
                        return Err(WaitError::UnexpectedState {
                            state,
                            expected: self.target.clone(),
                        });
                    } else {
                        target_occurrence = 0;
                    }
                    last_state = state;
                }
            }

            // Back off between refreshes, except while re-confirming a target
            if target_occurrence == 0 {
                wait = wait.saturating_mul(2);
            }
            wait = self.bound_wait(wait);

            let remaining = deadline.saturating_duration_since(Instant::now());
            trace!("waiting {:?} before next refresh", wait);
            sleep(wait.min(remaining)).await;
        }
    }

    fn bound_wait(&self, wait: Duration) -> Duration {
        match self.poll_interval {
            Some(interval) if !interval.is_zero() && interval < MAX_POLL_INTERVAL => interval,
            _ if wait < self.min_timeout => self.min_timeout,
            _ => wait.min(MAX_BACKOFF),
        }
    }

    fn timeout_error(&self, last_state: String) -> WaitError {
        WaitError::Timeout {
            last_state,
            expected: self.target.clone(),
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use proptest::prelude::*;

    /// Refresh function replaying `statuses`, then repeating the last one.
    /// `None` entries mean "not found".
    fn scripted(
        statuses: Vec<Option<&'static str>>,
        calls: Arc<AtomicUsize>,
    ) -> impl FnMut() -> std::future::Ready<ProviderResult<Refreshed<usize>>> {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            let status = statuses
                .get(n)
                .or_else(|| statuses.last())
                .copied()
                .flatten();
            std::future::ready(Ok(status.map(|s| (n, s.to_string()))))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn returns_object_when_target_reached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let conf = StateChangeConf::new(["pending"], ["available"], Duration::from_secs(60));

        let result = conf
            .wait_for_state(scripted(
                vec![Some("pending"), Some("pending"), Some("available")],
                calls.clone(),
            ))
            .await
            .unwrap();

        assert_eq!(result, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_timeout_still_waits_for_target() {
        let calls = Arc::new(AtomicUsize::new(0));
        let conf = StateChangeConf::new(["pending"], ["available"], Duration::MAX);

        let result = conf
            .wait_for_state(scripted(vec![Some("pending"), Some("available")], calls.clone()))
            .await
            .unwrap();

        assert_eq!(result, Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_error_stops_polling() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let conf = StateChangeConf::new(["pending"], ["available"], Duration::from_secs(60));

        let err = conf
            .wait_for_state(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Err::<Refreshed<()>, _>(ProviderError::api(
                    "AccessDenied",
                    "not authorized",
                )))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, WaitError::Refresh(ref e) if e.code() == Some("AccessDenied")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_while_pending() {
        let calls = Arc::new(AtomicUsize::new(0));
        let conf = StateChangeConf::new(["creating"], ["available"], Duration::from_secs(30));

        let err = conf
            .wait_for_state(scripted(vec![Some("creating")], calls))
            .await
            .unwrap_err();

        match err {
            WaitError::Timeout {
                last_state,
                expected,
                timeout,
            } => {
                assert_eq!(last_state, "creating");
                assert_eq!(expected, vec!["available".to_string()]);
                assert_eq!(timeout, Duration::from_secs(30));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_converts_to_timeout_provider_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let conf = StateChangeConf::new(["creating"], ["available"], Duration::from_secs(5));
        let err: ProviderError = conf
            .wait_for_state(scripted(vec![Some("creating")], calls))
            .await
            .unwrap_err()
            .into();
        assert!(err.is_timeout());
        assert!(err.message.contains("last state: 'creating'"));
    }

    #[tokio::test(start_paused = true)]
    async fn disappearance_satisfies_empty_target() {
        let calls = Arc::new(AtomicUsize::new(0));
        let conf = StateChangeConf::new(["deleting"], Vec::<String>::new(), Duration::from_secs(60));

        let result = conf
            .wait_for_state(scripted(vec![Some("deleting"), Some("deleting"), None], calls))
            .await
            .unwrap();

        assert_eq!(result, None);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_object_fails_after_not_found_checks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let conf = StateChangeConf::new(["pending"], ["available"], Duration::from_secs(600))
            .with_not_found_checks(3);

        let err = conf
            .wait_for_state(scripted(vec![None], calls.clone()))
            .await
            .unwrap_err();

        assert!(matches!(err, WaitError::NotFound { retries: 4 }));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_counter_resets_when_object_appears() {
        let calls = Arc::new(AtomicUsize::new(0));
        let conf = StateChangeConf::new(["pending"], ["available"], Duration::from_secs(600))
            .with_not_found_checks(2);

        let result = conf
            .wait_for_state(scripted(
                vec![None, None, Some("pending"), None, None, Some("available")],
                calls,
            ))
            .await
            .unwrap();

        assert_eq!(result, Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_state_is_an_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let conf = StateChangeConf::new(["pending"], ["available"], Duration::from_secs(60));

        let err = conf
            .wait_for_state(scripted(vec![Some("pending"), Some("failed")], calls))
            .await
            .unwrap_err();

        assert!(matches!(err, WaitError::UnexpectedState { ref state, .. } if state == "failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_pending_set_tolerates_other_states() {
        let calls = Arc::new(AtomicUsize::new(0));
        let conf = StateChangeConf::new(Vec::<String>::new(), ["created"], Duration::from_secs(60));

        let result = conf
            .wait_for_state(scripted(vec![Some("initializing"), Some("created")], calls))
            .await
            .unwrap();

        assert_eq!(result, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn continuous_target_occurrence_requires_consecutive_hits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let conf = StateChangeConf::new(Vec::<String>::new(), ["created"], Duration::from_secs(60))
            .with_continuous_target_occurrence(3);

        let result = conf
            .wait_for_state(scripted(
                vec![
                    Some("created"),
                    Some("created"),
                    None,
                    Some("created"),
                    Some("created"),
                    Some("created"),
                ],
                calls,
            ))
            .await
            .unwrap();

        assert_eq!(result, Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_and_poll_interval_set_the_cadence() {
        let calls = Arc::new(AtomicUsize::new(0));
        let conf = StateChangeConf::new(["pending"], ["available"], Duration::from_secs(120))
            .with_delay(Duration::from_secs(30))
            .with_poll_interval(Duration::from_secs(5));

        let start = Instant::now();
        conf.wait_for_state(scripted(
            vec![Some("pending"), Some("pending"), Some("available")],
            calls,
        ))
        .await
        .unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(40));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_is_bounded_by_min_timeout_and_cap() {
        let conf = StateChangeConf::new(["pending"], ["available"], Duration::from_secs(60))
            .with_min_timeout(Duration::from_secs(3));
        assert_eq!(conf.bound_wait(Duration::from_millis(200)), Duration::from_secs(3));
        assert_eq!(conf.bound_wait(Duration::from_secs(40)), MAX_BACKOFF);

        let fixed = conf.with_poll_interval(Duration::from_secs(200));
        assert_eq!(fixed.bound_wait(Duration::from_secs(40)), MAX_BACKOFF);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_refresh_is_cut_off_at_the_deadline() {
        let conf = StateChangeConf::new(["pending"], ["available"], Duration::from_secs(10));
        let err = conf
            .wait_for_state(|| async {
                sleep(Duration::from_secs(3600)).await;
                Ok::<Refreshed<()>, ProviderError>(None)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::Timeout { .. }));
    }

    proptest! {
        #[test]
        fn succeeds_iff_target_observed_before_timeout(
            statuses in proptest::collection::vec(prop_oneof![Just("pending"), Just("available")], 1..20),
            timeout_secs in 1u64..25,
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .unwrap();

            let mut replay: Vec<Option<&'static str>> = statuses.iter().copied().map(Some).collect();
            replay.push(Some("pending"));
            let calls = Arc::new(AtomicUsize::new(0));
            let conf = StateChangeConf::new(["pending"], ["available"], Duration::from_secs(timeout_secs))
                .with_poll_interval(Duration::from_secs(1));

            let result = runtime.block_on(conf.wait_for_state(scripted(replay, calls)));

            // Refresh number k happens k seconds after the start
            let first_target = statuses.iter().position(|s| *s == "available");
            match first_target {
                Some(k) if (k as u64) < timeout_secs => {
                    prop_assert_eq!(result.unwrap(), Some(k));
                }
                _ => {
                    let is_timeout = matches!(result, Err(WaitError::Timeout { .. }));
                    prop_assert!(is_timeout);
                }
            }
        }
    }
}
