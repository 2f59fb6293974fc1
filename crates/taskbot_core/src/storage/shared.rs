use crate::error::AppError;
use crate::storage::{RecordStore, StoreState};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Single exclusive-access point in front of a [`RecordStore`].
///
/// Every read-modify-write runs under one async mutex, so a task created
/// while the reminder engine is committing bookkeeping is never lost.
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<dyn RecordStore>,
    lock: Arc<Mutex<()>>,
}

impl SharedStore {
    pub fn new<S: RecordStore + 'static>(store: S) -> Self {
        Self::from_arc(Arc::new(store))
    }

    pub fn from_arc(store: Arc<dyn RecordStore>) -> Self {
        Self {
            inner: store,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Consistent snapshot; waits for any in-flight update.
    pub async fn read(&self) -> StoreState {
        let _guard = self.lock.lock().await;
        self.inner.load_all()
    }

    /// Load, mutate and save as one step. Nothing is written when `mutate`
    /// fails.
    pub async fn update<R, F>(&self, mutate: F) -> Result<R, AppError>
    where
        F: FnOnce(&mut StoreState) -> Result<R, AppError>,
    {
        let _guard = self.lock.lock().await;
        let mut state = self.inner.load_all();
        let result = mutate(&mut state)?;
        self.inner.save_all(&state)?;
        Ok(result)
    }

    /// Like [`update`](Self::update) but only writes when `mutate` reports a
    /// change.
    pub async fn update_if_changed<R, F>(&self, mutate: F) -> Result<R, AppError>
    where
        F: FnOnce(&mut StoreState) -> Result<(R, bool), AppError>,
    {
        let _guard = self.lock.lock().await;
        let mut state = self.inner.load_all();
        let (result, changed) = mutate(&mut state)?;
        if changed {
            self.inner.save_all(&state)?;
        }
        Ok(result)
    }
}
