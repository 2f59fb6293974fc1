use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::UtcOffset;
use time::macros::format_description;

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_ENV_VAR: &str = "TASKBOT_CONFIG_PATH";

pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MIN_RECURRENCE_MINUTES: u32 = 1;
pub const DEFAULT_OWNER: &str = "local";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store_path: Option<PathBuf>,
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
    #[serde(default = "default_min_recurrence_minutes")]
    pub min_recurrence_minutes: u32,
    /// Offset used to read and display wall-clock times, e.g. `"-05:00"`.
    #[serde(default)]
    pub utc_offset: Option<String>,
    /// Sender id (or a fragment of it) allowed to run admin commands.
    #[serde(default)]
    pub admin_id: Option<String>,
    #[serde(default = "default_owner")]
    pub default_owner: String,
}

fn default_tick_interval_secs() -> u64 {
    DEFAULT_TICK_INTERVAL_SECS
}

fn default_send_timeout_secs() -> u64 {
    DEFAULT_SEND_TIMEOUT_SECS
}

fn default_min_recurrence_minutes() -> u32 {
    DEFAULT_MIN_RECURRENCE_MINUTES
}

fn default_owner() -> String {
    DEFAULT_OWNER.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: None,
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
            send_timeout_secs: DEFAULT_SEND_TIMEOUT_SECS,
            min_recurrence_minutes: DEFAULT_MIN_RECURRENCE_MINUTES,
            utc_offset: None,
            admin_id: None,
            default_owner: default_owner(),
        }
    }
}

impl Config {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs.max(1))
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs.max(1))
    }

    /// Intervals below one minute are never allowed, whatever the file says.
    pub fn min_recurrence_minutes(&self) -> u32 {
        self.min_recurrence_minutes.max(1)
    }

    /// Configured offset, else the machine's local offset, else UTC.
    pub fn offset(&self) -> Result<UtcOffset, AppError> {
        match self.utc_offset.as_deref() {
            Some(raw) => parse_offset(raw),
            None => Ok(UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)),
        }
    }
}

pub fn parse_offset(raw: &str) -> Result<UtcOffset, AppError> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("utc") || trimmed.eq_ignore_ascii_case("z") {
        return Ok(UtcOffset::UTC);
    }
    let format = format_description!("[offset_hour sign:mandatory]:[offset_minute]");
    UtcOffset::parse(trimmed, &format)
        .map_err(|_| AppError::invalid_data(format!("utc_offset must look like -05:00, got '{trimmed}'")))
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub error: Option<AppError>,
}

pub fn config_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata)
            .join("taskbot")
            .join(CONFIG_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("taskbot")
            .join(CONFIG_FILE_NAME))
    }
}

pub fn load_config_with_fallback() -> ConfigLoad {
    match config_path() {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_with_fallback_from_path(path: &Path) -> ConfigLoad {
    if !path.exists() {
        return ConfigLoad {
            config: Config::default(),
            error: None,
        };
    }

    match load_config_from_path(path) {
        Ok(config) => ConfigLoad {
            config,
            error: None,
        },
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_from_path(path: &Path) -> Result<Config, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    let config: Config = serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })?;
    if let Some(raw) = config.utc_offset.as_deref() {
        parse_offset(raw)?;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::{Config, load_config_from_path, load_config_with_fallback_from_path, parse_offset};
    use std::fs;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    use time::macros::offset;

    fn temp_path(file_name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("taskbot-{nanos}-{file_name}"))
    }

    #[test]
    fn load_config_missing_returns_defaults_without_error() {
        let path = temp_path("missing-config.json");
        let result = load_config_with_fallback_from_path(&path);

        assert_eq!(result.config, Config::default());
        assert!(result.error.is_none());
    }

    #[test]
    fn load_config_invalid_returns_defaults_and_error() {
        let path = temp_path("invalid-config.json");
        fs::write(&path, "{ invalid json ").unwrap();

        let result = load_config_with_fallback_from_path(&path);
        fs::remove_file(&path).ok();

        assert_eq!(result.config, Config::default());
        assert!(result.error.is_some());
    }

    #[test]
    fn load_config_reads_valid_file() {
        let path = temp_path("valid-config.json");
        let content = serde_json::json!({
            "store_path": "/tmp/taskbot-data.json",
            "tick_interval_secs": 30,
            "utc_offset": "-05:00",
            "admin_id": "573001112233"
        });
        fs::write(&path, serde_json::to_string(&content).unwrap()).unwrap();

        let loaded = load_config_from_path(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded.tick_interval(), Duration::from_secs(30));
        assert_eq!(loaded.send_timeout_secs, 10);
        assert_eq!(loaded.min_recurrence_minutes, 1);
        assert_eq!(loaded.offset().unwrap(), offset!(-5));
        assert_eq!(loaded.admin_id.as_deref(), Some("573001112233"));
        assert_eq!(loaded.default_owner, "local");
    }

    #[test]
    fn load_config_rejects_bad_offset() {
        let path = temp_path("bad-offset.json");
        fs::write(&path, r#"{ "utc_offset": "bogota" }"#).unwrap();

        let result = load_config_with_fallback_from_path(&path);
        fs::remove_file(&path).ok();

        assert_eq!(result.error.map(|err| err.code()), Some("invalid_data"));
    }

    #[test]
    fn minimum_recurrence_never_drops_below_one() {
        let config = Config {
            min_recurrence_minutes: 0,
            ..Config::default()
        };
        assert_eq!(config.min_recurrence_minutes(), 1);
    }

    #[test]
    fn parse_offset_accepts_utc_alias() {
        assert_eq!(parse_offset("UTC").unwrap(), offset!(UTC));
        assert_eq!(parse_offset("+01:30").unwrap(), offset!(+1:30));
    }
}
