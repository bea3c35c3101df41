//! Cairn State Management
//!
//! Persists the identifiers and last read attributes of managed resources,
//! with locking so only one apply runs against a state at a time.
//!
//! # Overview
//!
//! - **StateFile**: The state document holding every managed resource
//! - **StateBackend**: A trait for state storage backends
//! - **LockInfo**: Information about state locks for concurrent access control
//!
//! # Example
//!
//! ```ignore
//! use cairn_state::{LocalBackend, StateBackend, acquire_lock_with_retry};
//!
//! let backend = LocalBackend::with_path("cairn.state.json".into());
//! let lock = acquire_lock_with_retry(&backend, "apply", &RetryPolicy::default()).await?;
//!
//! let mut state = backend.read_state().await?.unwrap_or_default();
//! // ... apply changes ...
//! state.increment_serial();
//! backend.write_state(&state).await?;
//!
//! backend.release_lock(&lock).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod lock;
pub mod state;

// Re-export main types for convenience
pub use backend::{BackendError, BackendResult, StateBackend, acquire_lock_with_retry};
pub use backends::LocalBackend;
pub use lock::LockInfo;
pub use state::{ResourceState, StateFile};
