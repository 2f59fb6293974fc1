use crate::error::AppError;
use crate::storage::{RecordStore, StoreState};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const STORE_FILE_NAME: &str = "data.json";
const STORE_ENV_VAR: &str = "TASKBOT_STORE_PATH";

pub fn store_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(STORE_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join("taskbot").join(STORE_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("taskbot")
            .join(STORE_FILE_NAME))
    }
}

/// Returns the env override when set, then `configured`, then the default
/// location.
pub fn resolve_store_path(configured: Option<&Path>) -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(STORE_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }
    match configured {
        Some(path) => Ok(path.to_path_buf()),
        None => store_path(),
    }
}

/// JSON document on disk holding users, groups and tasks.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl RecordStore for JsonFileStore {
    fn load_all(&self) -> StoreState {
        if !self.path.exists() {
            let state = StoreState::default();
            if let Err(err) = save_state(&self.path, &state) {
                warn!(path = %self.path.display(), "cannot initialize store: {err}");
            }
            return state;
        }

        match load_state(&self.path) {
            Ok(state) => state,
            Err(err) => {
                warn!(path = %self.path.display(), "store unreadable, using empty state: {err}");
                StoreState::default()
            }
        }
    }

    fn save_all(&self, state: &StoreState) -> Result<(), AppError> {
        save_state(&self.path, state)
    }
}

pub fn load_state(path: &Path) -> Result<StoreState, AppError> {
    let content = std::fs::read_to_string(path)?;
    let state: StoreState = serde_json::from_str(&content)?;
    Ok(state)
}

pub fn save_state(path: &Path, state: &StoreState) -> Result<(), AppError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(state)?;

    let tmp_path = temp_sibling(path);
    std::fs::write(&tmp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&tmp_path, permissions)?;
    }

    std::fs::rename(&tmp_path, path)?;
    debug!(
        path = %path.display(),
        tasks = state.tasks.len(),
        "store written"
    );

    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| STORE_FILE_NAME.into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::{JsonFileStore, load_state, save_state};
    use crate::model::{Group, Task};
    use crate::storage::{RecordStore, StoreState};
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};
    use time::macros::datetime;

    fn temp_path(file_name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("taskbot-{nanos}-{file_name}"))
    }

    fn sample_task() -> Task {
        Task {
            id: "task-1".to_string(),
            description: "demo".to_string(),
            due_date: datetime!(2025-12-20 09:00 UTC),
            recurrence_interval_minutes: Some(60),
            last_reminded_at: Some(datetime!(2025-12-20 10:00 UTC)),
            reminder_sent: false,
            is_completed: false,
            owner_id: "owner".to_string(),
        }
    }

    #[test]
    fn save_and_load_preserves_all_collections() {
        let path = temp_path("data.json");
        let state = StoreState {
            users: Vec::new(),
            groups: vec![Group {
                id: "123@g.us".to_string(),
                name: "Grupo".to_string(),
                joined_at: datetime!(2025-12-01 00:00 UTC),
            }],
            tasks: vec![sample_task()],
        };

        save_state(&path, &state).unwrap();
        let loaded = load_state(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded, state);
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let path = temp_path("missing.json");
        let store = JsonFileStore::new(&path);

        let state = store.load_all();
        let created = path.exists();
        fs::remove_file(&path).ok();

        assert_eq!(state, StoreState::default());
        assert!(created);
    }

    #[test]
    fn absent_collections_default_to_empty() {
        let path = temp_path("partial.json");
        fs::write(&path, r#"{ "tasks": [] }"#).unwrap();

        let state = JsonFileStore::new(&path).load_all();
        fs::remove_file(&path).ok();

        assert!(state.users.is_empty());
        assert!(state.groups.is_empty());
        assert!(state.tasks.is_empty());
    }

    #[test]
    fn corrupt_file_degrades_to_empty_state() {
        let path = temp_path("corrupt.json");
        fs::write(&path, "{ not json").unwrap();

        let state = JsonFileStore::new(&path).load_all();
        fs::remove_file(&path).ok();

        assert_eq!(state, StoreState::default());
    }

    #[test]
    fn load_state_reports_error_kinds() {
        let missing = temp_path("absent.json");
        let corrupt = temp_path("broken.json");
        fs::write(&corrupt, "{ not json").unwrap();

        let missing_err = load_state(&missing).unwrap_err();
        let corrupt_err = load_state(&corrupt).unwrap_err();
        fs::remove_file(&corrupt).ok();

        assert_eq!(missing_err.code(), "io_error");
        assert_eq!(corrupt_err.code(), "invalid_data");
    }

    #[test]
    fn save_leaves_no_temp_file_behind() {
        let path = temp_path("atomic.json");
        let store = JsonFileStore::new(&path);
        store
            .save_all(&StoreState {
                tasks: vec![sample_task()],
                ..StoreState::default()
            })
            .unwrap();

        let tmp = super::temp_sibling(&path);
        let tmp_exists = tmp.exists();
        fs::remove_file(&path).ok();

        assert!(!tmp_exists);
    }
}
