use std::{collections::HashMap, io, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::{fs, sync::Mutex};
use tracing::{debug, error, info, warn};

use crate::errors::ServiceError;
use crate::metrics;
use crate::storage::atomic::atomic_write;
use crate::store::{composite_key, PossessionRecord, PossessionStore};

/// On-disk shape: `{"taken": {"<owner>#<group>": {"user_id": .., "name": ..}}}`.
/// Unknown top-level fields are ignored on read and dropped on the next write.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default, deserialize_with = "null_as_empty")]
    taken: HashMap<String, PossessionRecord>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<HashMap<String, PossessionRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<HashMap<String, PossessionRecord>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Default)]
struct State {
    file: StateFile,
    /// Bumped on every mutation; orders snapshots for the flusher.
    generation: u64,
}

/// JSON file-backed store of possession records.
///
/// All access to the map goes through one mutex. Each mutation takes a
/// snapshot inside that section and flushes it outside, via temp file +
/// fsync + rename. Flushes are serialized by a second lock that remembers the
/// newest generation on disk, so an older snapshot never overwrites a newer one.
pub struct StateStore {
    state: Mutex<State>,
    flushed: Mutex<u64>,
    file_path: PathBuf,
}

impl StateStore {
    /// Create an empty store bound to `path`, creating the parent directory if needed.
    /// Call [`StateStore::initialize`] before use.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let file_path = path.into();
        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(dir = %parent.display(), error = %e, "cannot create state directory");
            }
        }
        Self { state: Mutex::new(State::default()), flushed: Mutex::new(0), file_path }
    }

    /// `new` followed by `initialize`.
    pub async fn open<P: Into<PathBuf>>(path: P) -> Result<Arc<Self>, ServiceError> {
        let store = Self::new(path);
        store.initialize().await?;
        Ok(Arc::new(store))
    }

    pub fn file_path(&self) -> &std::path::Path {
        &self.file_path
    }

    /// Load the backing file once.
    ///
    /// A missing file is bootstrapped with an empty state. An unreadable or
    /// malformed file is logged and left untouched, and the in-memory state
    /// stays as it was.
    pub async fn initialize(&self) -> Result<(), ServiceError> {
        let bytes = match fs::read(&self.file_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.mutate(|_| ()).await?;
                info!(path = %self.file_path.display(), "state file created");
                return Ok(());
            }
            Err(e) => {
                warn!(path = %self.file_path.display(), error = %e, "failed to read state file; keeping defaults");
                return Ok(());
            }
        };

        match serde_json::from_slice::<StateFile>(&bytes) {
            Ok(loaded) => {
                let mut state = self.state.lock().await;
                info!(path = %self.file_path.display(), records = loaded.taken.len(), "state file loaded");
                state.file.taken = loaded.taken;
            }
            Err(e) => {
                warn!(path = %self.file_path.display(), error = %e, "failed to parse state file; keeping defaults");
                self.preserve_corrupt(&bytes).await;
            }
        }
        Ok(())
    }

    /// Where an unparsable state file is copied before the next save replaces it.
    pub fn corrupt_backup_path(&self) -> PathBuf {
        let mut name = self.file_path.clone().into_os_string();
        name.push(".corrupt");
        PathBuf::from(name)
    }

    // 下一次保存会覆盖原文件，先留一份副本供人工恢复
    async fn preserve_corrupt(&self, bytes: &[u8]) {
        let backup = self.corrupt_backup_path();
        let staged = backup.clone();
        let contents = bytes.to_vec();
        match tokio::task::spawn_blocking(move || atomic_write(&staged, &contents)).await {
            Ok(Ok(())) => warn!(backup = %backup.display(), "unparsable state file copied aside"),
            Ok(Err(e)) => warn!(backup = %backup.display(), error = %e, "failed to copy unparsable state file"),
            Err(e) => warn!(backup = %backup.display(), error = %e, "state backup task failed"),
        }
    }

    /// Apply `f` to the record map under the exclusive section, then flush.
    /// The in-memory change stays applied even when the flush fails.
    async fn mutate<F, R>(&self, f: F) -> Result<R, ServiceError>
    where
        F: FnOnce(&mut HashMap<String, PossessionRecord>) -> R,
    {
        let (out, generation, snapshot) = {
            let mut state = self.state.lock().await;
            let out = f(&mut state.file.taken);
            state.generation += 1;
            let snapshot = serde_json::to_vec_pretty(&state.file)?;
            (out, state.generation, snapshot)
        };
        self.flush(generation, snapshot).await?;
        Ok(out)
    }

    async fn flush(&self, generation: u64, snapshot: Vec<u8>) -> Result<(), ServiceError> {
        let mut flushed = self.flushed.lock().await;
        if *flushed >= generation {
            debug!(generation, on_disk = *flushed, "newer snapshot already flushed");
            return Ok(());
        }

        let path = self.file_path.clone();
        let written = tokio::task::spawn_blocking(move || atomic_write(&path, &snapshot))
            .await
            .map_err(|e| ServiceError::storage("flush task", e))?;
        if let Err(e) = written {
            metrics::STATE_FLUSH_FAILURES_TOTAL.inc();
            error!(path = %self.file_path.display(), error = %e, "failed to save state file");
            return Err(ServiceError::storage("write state file", e));
        }
        *flushed = generation;
        Ok(())
    }
}

#[async_trait]
impl PossessionStore for StateStore {
    async fn get(&self, owner_id: &str, group_id: &str) -> Option<PossessionRecord> {
        let state = self.state.lock().await;
        state.file.taken.get(&composite_key(owner_id, group_id)).cloned()
    }

    async fn set(
        &self,
        owner_id: &str,
        group_id: &str,
        target_user_id: i64,
        target_name: &str,
    ) -> Result<(), ServiceError> {
        let key = composite_key(owner_id, group_id);
        let record = PossessionRecord { target_user_id, target_name: target_name.to_string() };
        self.mutate(move |taken| {
            taken.insert(key, record);
        })
        .await
    }

    async fn clear(&self, owner_id: &str, group_id: &str) -> Result<bool, ServiceError> {
        let key = composite_key(owner_id, group_id);
        self.mutate(move |taken| taken.remove(&key).is_some()).await
    }
}
