//! State backend trait and error types

use std::sync::Mutex;

use async_trait::async_trait;
use cairn_core::provider::ProviderError;
use cairn_core::retry::{RetryPolicy, retry_when};
use log::{debug, info};
use thiserror::Error;

use crate::lock::LockInfo;
use crate::state::StateFile;

/// Errors that can occur when interacting with a state backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// The state is locked by another process
    #[error("State is locked by {who} (lock ID: {lock_id}, operation: {operation})")]
    Locked {
        lock_id: String,
        who: String,
        operation: String,
    },

    #[error("Lock not found: {0}")]
    LockNotFound(String),

    /// Lock ID mismatch when trying to release
    #[error("Lock ID mismatch: expected {expected}, got {actual}")]
    LockMismatch { expected: String, actual: String },

    /// State file is corrupted or invalid
    #[error("Invalid state file {path}: {source}")]
    InvalidState {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// State lineage mismatch (prevents accidental state overwrites)
    #[error("State lineage mismatch: expected {expected}, got {actual}")]
    LineageMismatch { expected: String, actual: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BackendError {
    pub fn locked(lock: &LockInfo) -> Self {
        Self::Locked {
            lock_id: lock.id.clone(),
            who: lock.who.clone(),
            operation: lock.operation.clone(),
        }
    }

    pub fn io(path: impl std::fmt::Display, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_string(),
            source,
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked { .. })
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Trait for state storage backends
///
/// This trait defines the interface for storing and retrieving state files,
/// as well as managing locks for concurrent access control.
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Read the current state from the backend
    ///
    /// Returns `None` if no state exists (first-time use)
    async fn read_state(&self) -> BackendResult<Option<StateFile>>;

    /// Write the state to the backend
    ///
    /// The state's serial number should be incremented before calling this.
    /// A state with a different lineage than the stored one is rejected.
    async fn write_state(&self, state: &StateFile) -> BackendResult<()>;

    /// Acquire a lock for the given operation
    ///
    /// Fails with [`BackendError::Locked`] while another unexpired lock is held
    async fn acquire_lock(&self, operation: &str) -> BackendResult<LockInfo>;

    /// Release a previously acquired lock
    async fn release_lock(&self, lock: &LockInfo) -> BackendResult<()>;

    /// Force release a lock by its ID
    ///
    /// This is an administrative operation that should be used with caution
    async fn force_unlock(&self, lock_id: &str) -> BackendResult<()>;

    /// Prepare the backend's storage for first use
    async fn init(&self) -> BackendResult<()>;
}

const STATE_LOCKED: &str = "StateLocked";

/// Acquire the lock, waiting out other holders within the policy's budget.
/// Errors other than [`BackendError::Locked`] are returned immediately.
pub async fn acquire_lock_with_retry(
    backend: &dyn StateBackend,
    operation: &str,
    policy: &RetryPolicy,
) -> BackendResult<LockInfo> {
    let held: Mutex<Option<BackendError>> = Mutex::new(None);
    let last_locked = &held;

    let outcome = retry_when(
        policy,
        move || async move {
            match backend.acquire_lock(operation).await {
                Err(err) if err.is_locked() => {
                    debug!("{}", err);
                    let retryable = ProviderError::api(STATE_LOCKED, err.to_string());
                    if let Ok(mut slot) = last_locked.lock() {
                        *slot = Some(err);
                    }
                    Err(retryable)
                }
                other => Ok(other),
            }
        },
        |err| err.code() == Some(STATE_LOCKED),
    )
    .await;

    match outcome {
        Ok(result) => {
            if let Ok(lock) = &result {
                info!("acquired state lock {}", lock.id);
            }
            result
        }
        Err(err) => match held.into_inner().ok().flatten() {
            Some(locked) => Err(locked),
            None => Err(BackendError::LockNotFound(err.message)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Backend whose lock is held by someone else for the first `busy` attempts
    struct BusyBackend {
        busy: u32,
        attempts: AtomicU32,
        holder: LockInfo,
    }

    impl BusyBackend {
        fn new(busy: u32) -> Self {
            Self {
                busy,
                attempts: AtomicU32::new(0),
                holder: LockInfo::new("apply"),
            }
        }
    }

    #[async_trait]
    impl StateBackend for BusyBackend {
        async fn read_state(&self) -> BackendResult<Option<StateFile>> {
            Ok(None)
        }

        async fn write_state(&self, _state: &StateFile) -> BackendResult<()> {
            Ok(())
        }

        async fn acquire_lock(&self, operation: &str) -> BackendResult<LockInfo> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.busy {
                Err(BackendError::locked(&self.holder))
            } else {
                Ok(LockInfo::new(operation))
            }
        }

        async fn release_lock(&self, _lock: &LockInfo) -> BackendResult<()> {
            Ok(())
        }

        async fn force_unlock(&self, lock_id: &str) -> BackendResult<()> {
            Err(BackendError::LockNotFound(lock_id.to_string()))
        }

        async fn init(&self) -> BackendResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_backend_error_locked() {
        let lock = LockInfo::new("apply");
        match BackendError::locked(&lock) {
            BackendError::Locked {
                lock_id,
                who,
                operation,
            } => {
                assert_eq!(lock_id, lock.id);
                assert_eq!(who, lock.who);
                assert_eq!(operation, "apply");
            }
            other => panic!("Expected Locked error, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn lock_retry_waits_for_holder() {
        let backend = BusyBackend::new(3);
        let lock = acquire_lock_with_retry(&backend, "destroy", &RetryPolicy::new(Duration::from_secs(60)))
            .await
            .unwrap();
        assert_eq!(lock.operation, "destroy");
        assert_eq!(backend.attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn lock_retry_reports_holder_when_budget_runs_out() {
        let backend = BusyBackend::new(u32::MAX);
        let policy = RetryPolicy::new(Duration::from_secs(60)).with_max_attempts(3);
        let err = acquire_lock_with_retry(&backend, "apply", &policy)
            .await
            .unwrap_err();

        match err {
            BackendError::Locked { lock_id, .. } => assert_eq!(lock_id, backend.holder.id),
            other => panic!("Expected Locked error, got {:?}", other),
        }
        assert_eq!(backend.attempts.load(Ordering::SeqCst), 3);
    }
}
