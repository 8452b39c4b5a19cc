use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Environment variable overriding the base directory
pub const BASE_DIR_ENV: &str = "POKE_PATH";

const DEFAULT_DIR_NAME: &str = "poke";
const CONFIG_FILENAME: &str = "config.json";
const STORE_FILENAME: &str = ".feed";
const LOG_DIR_NAME: &str = "logs";

const DEFAULT_POLL_INTERVAL_SECS: u64 = 6 * 60 * 60;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 5;
const DEFAULT_DOWNLOAD_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_DOWNLOAD_READ_TIMEOUT_SECS: u64 = 60;

/// Runtime configuration, built once at startup and passed by reference
#[derive(Debug, Clone)]
pub struct Config {
    /// Root for the store, logs and all subscription directories
    pub base_dir: PathBuf,
    /// Sleep between passes in periodic mode
    pub poll_interval: Duration,
    /// Total timeout for fetching a feed document
    pub fetch_timeout: Duration,
    pub download_connect_timeout: Duration,
    /// Maximum silence on a download stream before it is abandoned
    pub download_read_timeout: Duration,
}

/// Optional overrides read from `<base>/config.json`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    poll_interval_secs: Option<u64>,
    fetch_timeout_secs: Option<u64>,
    download_connect_timeout_secs: Option<u64>,
    download_read_timeout_secs: Option<u64>,
}

impl Config {
    /// Default configuration rooted at `base_dir`
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            download_connect_timeout: Duration::from_secs(DEFAULT_DOWNLOAD_CONNECT_TIMEOUT_SECS),
            download_read_timeout: Duration::from_secs(DEFAULT_DOWNLOAD_READ_TIMEOUT_SECS),
        }
    }

    /// Load configuration from the environment and the optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let base_dir = resolve_base_dir(
            std::env::var_os(BASE_DIR_ENV).map(PathBuf::from),
            std::env::var_os("HOME").map(PathBuf::from),
        )?;
        Self::load_from(base_dir)
    }

    /// Load configuration rooted at `base_dir`, applying `config.json` if present
    pub fn load_from(base_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::with_base_dir(base_dir);
        let path = config.base_dir.join(CONFIG_FILENAME);

        if !path.exists() {
            return Ok(config);
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadFailed {
            path: path.clone(),
            source: e,
        })?;
        let file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse { path, source: e })?;

        if let Some(secs) = file.poll_interval_secs {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = file.fetch_timeout_secs {
            config.fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.download_connect_timeout_secs {
            config.download_connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.download_read_timeout_secs {
            config.download_read_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Path of the persisted subscription store
    pub fn store_path(&self) -> PathBuf {
        self.base_dir.join(STORE_FILENAME)
    }

    /// Directory holding the daily log files
    pub fn log_dir(&self) -> PathBuf {
        self.base_dir.join(LOG_DIR_NAME)
    }

    /// Create the base and log directories if missing
    pub fn ensure_dirs(&self) -> Result<(), ConfigError> {
        for dir in [self.base_dir.clone(), self.log_dir()] {
            create_dir(&dir)?;
        }
        Ok(())
    }
}

fn create_dir(dir: &Path) -> Result<(), ConfigError> {
    std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDirectoryFailed {
        path: dir.to_path_buf(),
        source: e,
    })
}

/// An empty override counts as unset
fn resolve_base_dir(
    override_dir: Option<PathBuf>,
    home: Option<PathBuf>,
) -> Result<PathBuf, ConfigError> {
    match override_dir.filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => Ok(dir),
        None => home
            .filter(|p| !p.as_os_str().is_empty())
            .map(|h| h.join(DEFAULT_DIR_NAME))
            .ok_or(ConfigError::NoBaseDir),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn override_wins_over_home() {
        let dir = resolve_base_dir(Some("/data/pods".into()), Some("/home/me".into())).unwrap();
        assert_eq!(dir, PathBuf::from("/data/pods"));
    }

    #[test]
    fn empty_override_falls_back_to_home() {
        let dir = resolve_base_dir(Some(PathBuf::new()), Some("/home/me".into())).unwrap();
        assert_eq!(dir, PathBuf::from("/home/me/poke"));
    }

    #[test]
    fn missing_everything_is_an_error() {
        assert!(matches!(
            resolve_base_dir(None, None),
            Err(ConfigError::NoBaseDir)
        ));
    }

    #[test]
    fn defaults_without_config_file() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(dir.path()).unwrap();

        assert_eq!(config.poll_interval, Duration::from_secs(21600));
        assert_eq!(config.fetch_timeout, Duration::from_secs(5));
        assert_eq!(config.store_path(), dir.path().join(".feed"));
        assert_eq!(config.log_dir(), dir.path().join("logs"));
    }

    #[test]
    fn config_file_overrides_selected_fields() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{"poll_interval_secs": 60, "fetch_timeout_secs": 2}"#,
        )
        .unwrap();

        let config = Config::load_from(dir.path()).unwrap();

        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.fetch_timeout, Duration::from_secs(2));
        assert_eq!(config.download_read_timeout, Duration::from_secs(60));
    }

    #[test]
    fn malformed_config_file_is_rejected() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "{not json").unwrap();

        let result = Config::load_from(dir.path());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn ensure_dirs_creates_log_dir() {
        let dir = tempdir().unwrap();
        let config = Config::with_base_dir(dir.path().join("nested"));

        config.ensure_dirs().unwrap();
        assert!(config.log_dir().is_dir());
    }
}
