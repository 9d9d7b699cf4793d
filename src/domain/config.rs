//! Application configuration.
//!
//! Every field has a serde default so a partial `config.toml` still loads.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable holding the raw session `Cookie` header.
pub const COOKIE_ENV: &str = "FIVERR_COOKIE";

/// Upstream inbox API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL the `contacts` and `conversation/<identity>` paths hang off.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Raw `Cookie` header of an established browser session.
    #[serde(default)]
    pub cookie: Option<String>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            cookie: None,
            user_agent: default_user_agent(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ApiConfig {
    /// Cookie from the environment, falling back to the config file.
    #[must_use]
    pub fn resolved_cookie(&self) -> Option<String> {
        std::env::var(COOKIE_ENV)
            .ok()
            .filter(|c| !c.trim().is_empty())
            .or_else(|| self.cookie.clone())
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_base_url() -> String {
    "https://www.fiverr.com/inbox".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36"
        .to_string()
}

const fn default_timeout() -> u64 {
    30
}

/// Delays between successive batch requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_contact_delay")]
    pub contact_delay_ms: u64,

    #[serde(default = "default_message_delay")]
    pub message_delay_ms: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            contact_delay_ms: default_contact_delay(),
            message_delay_ms: default_message_delay(),
        }
    }
}

impl PaginationConfig {
    /// No delays at all, for tests and replays.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            contact_delay_ms: 0,
            message_delay_ms: 0,
        }
    }

    #[must_use]
    pub const fn contact_delay(&self) -> Duration {
        Duration::from_millis(self.contact_delay_ms)
    }

    #[must_use]
    pub const fn message_delay(&self) -> Duration {
        Duration::from_millis(self.message_delay_ms)
    }
}

const fn default_contact_delay() -> u64 {
    1000
}

const fn default_message_delay() -> u64 {
    500
}

/// Progress delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Delivery attempts per event before it is dropped.
    #[serde(default = "default_attempts")]
    pub max_attempts: u32,

    /// Backoff unit; attempt `n` waits `n * backoff_ms`.
    #[serde(default = "default_backoff")]
    pub backoff_ms: u64,

    /// Capacity of the progress queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_attempts(),
            backoff_ms: default_backoff(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

const fn default_attempts() -> u32 {
    3
}

const fn default_backoff() -> u64 {
    100
}

const fn default_queue_capacity() -> usize {
    64
}

/// Path configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    /// Base data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub pagination: PaginationConfig,

    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub paths: PathConfig,
}

impl AppConfig {
    /// Get the data directory, using default if not configured.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.paths
            .data_dir
            .clone()
            .unwrap_or_else(Self::default_data_dir)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".fiverr-inbox-export")
    }

    /// Get the key-value store path.
    #[must_use]
    pub fn storage_db_path(&self) -> PathBuf {
        self.data_dir().join("storage.db")
    }

    /// Get the exports directory path.
    #[must_use]
    pub fn exports_dir(&self) -> PathBuf {
        self.data_dir().join("exports")
    }
}
