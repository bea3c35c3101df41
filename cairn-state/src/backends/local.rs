//! Local file backend for state storage
//!
//! State lives in a JSON file (default: cairn.state.json) next to a `.lock`
//! file holding the current [`LockInfo`]. State writes go to a temporary
//! sibling first and are renamed over the old file, so a crash mid-write
//! leaves the previous state intact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, warn};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::backend::{BackendError, BackendResult, StateBackend};
use crate::lock::LockInfo;
use crate::state::StateFile;

pub struct LocalBackend {
    state_path: PathBuf,
    lock_path: PathBuf,
}

impl LocalBackend {
    pub const DEFAULT_STATE_FILE: &'static str = "cairn.state.json";

    pub fn new() -> Self {
        Self::with_path(PathBuf::from(Self::DEFAULT_STATE_FILE))
    }

    pub fn with_path(state_path: PathBuf) -> Self {
        let lock_path = state_path.with_extension("lock");
        Self {
            state_path,
            lock_path,
        }
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    async fn read_lock(&self) -> BackendResult<Option<LockInfo>> {
        let content = match fs::read_to_string(&self.lock_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BackendError::io(self.lock_path.display(), e)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| BackendError::InvalidState {
                path: self.lock_path.display().to_string(),
                source,
            })
    }

    /// Create the lock file, failing if it already exists.
    ///
    /// The lock is written in full to a private sibling and then hard-linked
    /// into place, so readers never see a partially written lock.
    async fn create_lock(&self, lock: &LockInfo) -> std::io::Result<()> {
        let tmp_path = self.lock_path.with_extension(format!("lock.{}.tmp", lock.id));
        let result = async {
            let content = serde_json::to_vec_pretty(lock)?;
            let mut file = fs::File::create(&tmp_path).await?;
            file.write_all(&content).await?;
            file.sync_all().await?;
            drop(file);
            fs::hard_link(&tmp_path, &self.lock_path).await
        }
        .await;

        if let Err(e) = fs::remove_file(&tmp_path).await
            && e.kind() != ErrorKind::NotFound
        {
            warn!("failed to remove {}: {}", tmp_path.display(), e);
        }
        result
    }

    async fn remove_lock(&self) -> BackendResult<()> {
        fs::remove_file(&self.lock_path)
            .await
            .map_err(|e| BackendError::io(self.lock_path.display(), e))
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateBackend for LocalBackend {
    async fn read_state(&self) -> BackendResult<Option<StateFile>> {
        let content = match fs::read_to_string(&self.state_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BackendError::io(self.state_path.display(), e)),
        };

        let state = serde_json::from_str(&content).map_err(|source| BackendError::InvalidState {
            path: self.state_path.display().to_string(),
            source,
        })?;
        Ok(Some(state))
    }

    async fn write_state(&self, state: &StateFile) -> BackendResult<()> {
        if let Some(existing) = self.read_state().await?
            && existing.lineage != state.lineage
        {
            return Err(BackendError::LineageMismatch {
                expected: existing.lineage,
                actual: state.lineage.clone(),
            });
        }

        let content = serde_json::to_vec_pretty(state)?;
        let tmp_path = self.state_path.with_extension("json.tmp");

        let mut file = fs::File::create(&tmp_path)
            .await
            .map_err(|e| BackendError::io(tmp_path.display(), e))?;
        file.write_all(&content)
            .await
            .map_err(|e| BackendError::io(tmp_path.display(), e))?;
        file.sync_all()
            .await
            .map_err(|e| BackendError::io(tmp_path.display(), e))?;
        drop(file);

        fs::rename(&tmp_path, &self.state_path)
            .await
            .map_err(|e| BackendError::io(self.state_path.display(), e))?;

        debug!(
            "wrote state serial {} to {}",
            state.serial,
            self.state_path.display()
        );
        Ok(())
    }

    async fn acquire_lock(&self, operation: &str) -> BackendResult<LockInfo> {
        let lock = LockInfo::new(operation);

        for _ in 0..2 {
            match self.create_lock(&lock).await {
                Ok(()) => return Ok(lock),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(BackendError::io(self.lock_path.display(), e)),
            }

            match self.read_lock().await? {
                Some(existing) if !existing.is_expired() => {
                    return Err(BackendError::locked(&existing));
                }
                Some(existing) => {
                    warn!("breaking expired state lock {}", existing);
                    self.remove_lock().await?;
                }
                // Released between our create and read
                None => {}
            }
        }

        match self.read_lock().await? {
            Some(existing) => Err(BackendError::locked(&existing)),
            None => Err(BackendError::LockNotFound(lock.id)),
        }
    }

    async fn release_lock(&self, lock: &LockInfo) -> BackendResult<()> {
        let Some(existing) = self.read_lock().await? else {
            return Err(BackendError::LockNotFound(lock.id.clone()));
        };
        if existing.id != lock.id {
            return Err(BackendError::LockMismatch {
                expected: lock.id.clone(),
                actual: existing.id,
            });
        }
        self.remove_lock().await
    }

    async fn force_unlock(&self, lock_id: &str) -> BackendResult<()> {
        let Some(existing) = self.read_lock().await? else {
            return Err(BackendError::LockNotFound(lock_id.to_string()));
        };
        if existing.id != lock_id {
            return Err(BackendError::LockMismatch {
                expected: lock_id.to_string(),
                actual: existing.id,
            });
        }
        warn!("force-unlocking state lock {}", existing);
        self.remove_lock().await
    }

    async fn init(&self) -> BackendResult<()> {
        if let Some(parent) = self.state_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| BackendError::io(parent.display(), e))?;
        }
        Ok(())
    }
}
