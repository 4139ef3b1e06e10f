use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError, Weak},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-path write locks, created on demand.
///
/// The table only keeps weak references, so a path's mutex lives exactly as long as
/// someone holds or waits on it. Dead entries are swept whenever a new one is inserted.
#[derive(Debug, Default)]
pub struct PathLocks {
    table: Mutex<HashMap<PathBuf, Weak<AsyncMutex<()>>>>,
}

pub type PathGuard = OwnedMutexGuard<()>;

impl PathLocks {
    pub fn new() -> Self {
        Default::default()
    }

    /// Waits until `path` is free and returns a guard releasing it on drop.
    pub async fn lock(&self, path: &Path) -> PathGuard {
        self.mutex_for(path).lock_owned().await
    }

    fn mutex_for(&self, path: &Path) -> Arc<AsyncMutex<()>> {
        // Never held across an await; a panic elsewhere cannot leave the map inconsistent.
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(mutex) = table.get(path).and_then(Weak::upgrade) {
            return mutex;
        }

        table.retain(|_, weak| weak.strong_count() > 0);

        let mutex = Arc::new(AsyncMutex::new(()));
        table.insert(path.to_path_buf(), Arc::downgrade(&mutex));
        mutex
    }

    /// Number of paths that currently have a live lock.
    pub fn active(&self) -> usize {
        let table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table.values().filter(|weak| weak.strong_count() > 0).count()
    }
}
