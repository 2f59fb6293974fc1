use crate::error::AppError;
use crate::model::{Group, Task, User};
use serde::{Deserialize, Serialize};

pub mod json_store;
pub mod memory;
pub mod shared;

pub use json_store::JsonFileStore;
pub use memory::MemoryStore;
pub use shared::SharedStore;

/// Everything the bot persists, read and written as one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// Whole-document record store.
///
/// There are no transactions; callers that mutate must go through
/// [`SharedStore`] so load, mutate and save happen under one lock.
pub trait RecordStore: Send + Sync {
    /// Never fails: missing or unreadable data comes back as the default state.
    fn load_all(&self) -> StoreState;

    /// Replaces the stored document. Readers never observe a partial write.
    fn save_all(&self, state: &StoreState) -> Result<(), AppError>;
}
