use std::path::PathBuf;
use std::time::Duration;

use crawl::utils::absolute_url;
use crawl::ClientOptions;
use thiserror::Error;

use crate::store::SnapshotStore;

pub const ENV_ROOT_URL: &str = "BILLS_ROOT_URL";
pub const ENV_SESSIONS_PATH: &str = "BILLS_SESSIONS_PATH";
pub const ENV_DATA_DIR: &str = "BILLS_DATA_DIR";
pub const ENV_DELAY_MS: &str = "BILLS_DELAY_MS";
pub const ENV_TIMEOUT_SECS: &str = "BILLS_TIMEOUT_SECS";

const DEFAULT_ROOT_URL: &str = "https://www.ola.org/";
const DEFAULT_SESSIONS_PATH: &str = "en/legislative-business/bills";
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_DELAY_MS: u64 = 1000;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a whole number, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

/// Which sessions get their bills and statuses re-scraped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshMode {
    /// New sessions and sessions still sitting.
    #[default]
    Incremental,
    /// Every listed session.
    Full,
    /// Only the most recent session.
    Current,
}

impl RefreshMode {
    pub fn from_flags(full: bool, current: bool) -> Self {
        match (full, current) {
            (true, _) => RefreshMode::Full,
            (false, true) => RefreshMode::Current,
            (false, false) => RefreshMode::Incremental,
        }
    }
}

/// Settings for one run; built once in `main` and handed down explicitly.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub root_url: String,
    /// Site-relative path of the session listing.
    pub sessions_path: String,
    pub data_dir: PathBuf,
    pub delay: Duration,
    pub timeout: Duration,
    pub mode: RefreshMode,
    pub progress: bool,
}

/// Command-line values; anything set here beats the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub root_url: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub delay_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub mode: RefreshMode,
    pub progress: bool,
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let root_url = lookup(ENV_ROOT_URL).unwrap_or_else(|| DEFAULT_ROOT_URL.to_string());
        let sessions_path = lookup(ENV_SESSIONS_PATH).unwrap_or_else(|| DEFAULT_SESSIONS_PATH.to_string());
        let number = |name: &'static str, default: u64| match lookup(name) {
            None => Ok(default),
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidNumber { name, value }),
        };

        Ok(SyncConfig {
            sessions_path,
            data_dir: lookup(ENV_DATA_DIR).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            delay: Duration::from_millis(number(ENV_DELAY_MS, DEFAULT_DELAY_MS)?),
            timeout: Duration::from_secs(number(ENV_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS)?),
            mode: RefreshMode::default(),
            progress: true,
            root_url,
        })
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(root_url) = overrides.root_url {
            self.root_url = root_url;
        }
        if let Some(data_dir) = overrides.data_dir {
            self.data_dir = data_dir;
        }
        if let Some(delay_ms) = overrides.delay_ms {
            self.delay = Duration::from_millis(delay_ms);
        }
        if let Some(timeout_secs) = overrides.timeout_secs {
            self.timeout = Duration::from_secs(timeout_secs);
        }
        self.mode = overrides.mode;
        self.progress = overrides.progress;
        self
    }

    pub fn sessions_url(&self) -> String {
        absolute_url(&self.root_url, &self.sessions_path)
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            referer: self.root_url.clone(),
            delay: self.delay,
            timeout: self.timeout,
        }
    }

    pub fn store(&self) -> SnapshotStore {
        SnapshotStore::new(&self.data_dir)
    }
}
