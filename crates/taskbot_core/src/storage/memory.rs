use crate::error::AppError;
use crate::storage::{RecordStore, StoreState};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-process store. Keeps a count of writes so callers can check the
/// engine's write discipline.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new(state: StoreState) -> Self {
        Self {
            state: Mutex::new(state),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> StoreState {
        self.load_all()
    }
}

impl RecordStore for MemoryStore {
    fn load_all(&self) -> StoreState {
        match self.state.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn save_all(&self, state: &StoreState) -> Result<(), AppError> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| AppError::io("memory store lock poisoned"))?;
        *guard = state.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
