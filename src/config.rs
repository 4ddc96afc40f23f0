//! Store configuration, optionally read from `docstore.toml`
//!
//! Every key is optional; missing keys take the defaults below.
//!
//! ```toml
//! database = "data/documents.db"
//! busy_timeout_ms = 5000
//! pool_size = 8
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths::{DEFAULT_HTML_DIR, html_path_in};
use crate::{Error, Result};

pub const DEFAULT_CONFIG_FILE: &str = "docstore.toml";
pub const DEFAULT_DATABASE_PATH: &str = "data/documents.db";
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_POOL_SIZE: u32 = 8;
pub const DEFAULT_POOL_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file holding both tables
    pub database: PathBuf,
    /// How long a session waits on a locked database before failing
    pub busy_timeout_ms: u64,
    /// Upper bound on open sessions
    pub pool_size: u32,
    /// How long a call waits for a free session
    pub pool_timeout_ms: u64,
    /// Idle sessions are closed after this long
    pub idle_timeout_secs: u64,
    /// Where the crawler keeps raw HTML
    pub html_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE_PATH),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            pool_size: DEFAULT_POOL_SIZE,
            pool_timeout_ms: DEFAULT_POOL_TIMEOUT_MS,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            html_dir: PathBuf::from(DEFAULT_HTML_DIR),
        }
    }
}

impl StoreConfig {
    pub fn with_database(path: impl Into<PathBuf>) -> Self {
        Self {
            database: path.into(),
            ..Self::default()
        }
    }

    /// Read a config file. A missing file is an error here.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::config(path, e))?;
        toml::from_str(&contents).map_err(|e| Error::config(path, e))
    }

    /// Read `path`, or `docstore.toml` when `None`; defaults if the file is absent
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn pool_timeout(&self) -> Duration {
        Duration::from_millis(self.pool_timeout_ms.max(1))
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs.max(1))
    }

    pub fn html_path(&self, url: &str) -> PathBuf {
        html_path_in(&self.html_dir, url)
    }
}

/// Create the directory the database file lives in
pub fn ensure_db_dir(db_path: &Path) -> std::io::Result<()> {
    match db_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
