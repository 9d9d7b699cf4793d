//! Configuration file management.
//!
//! Handles loading and saving TOML configuration files.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{AppConfig, AppError, Result};

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# Fiverr Inbox Export Configuration
# Auto-generated - edit as needed

[api]
# Base URL of the inbox API
base_url = "https://www.fiverr.com/inbox"

# Raw Cookie header copied from a logged-in browser session.
# The FIVERR_COOKIE environment variable takes precedence.
# cookie = "..."

# Request timeout in seconds
timeout_secs = 30

[pagination]
# Pause between contact batches in milliseconds
contact_delay_ms = 1000

# Pause between message batches in milliseconds
message_delay_ms = 500

[notify]
# Delivery attempts per progress event
max_attempts = 3

# Linear backoff unit in milliseconds
backoff_ms = 100

# Progress queue capacity
queue_capacity = 64

[paths]
# Custom data directory (optional, defaults to ~/.fiverr-inbox-export)
# data_dir = "/custom/path"
"#;

/// Load configuration from file or fall back to defaults.
///
/// # Errors
/// Returns error if file exists but cannot be read or parsed.
pub fn load_config() -> Result<AppConfig> {
    let config_path = config_file_path();

    if config_path.exists() {
        load_config_from_file(&config_path)
    } else {
        Ok(AppConfig::default())
    }
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read config file: {}", path.display()), e))?;

    toml::from_str(&content).map_err(|e| AppError::Config {
        message: format!("Failed to parse config file: {e}"),
    })
}

/// Write the default configuration file into `dir` if it doesn't exist.
///
/// Returns the config path and whether it was created.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn ensure_config_exists_in(dir: &Path) -> Result<(PathBuf, bool)> {
    let config_path = dir.join("config.toml");

    if config_path.exists() {
        return Ok((config_path, false));
    }

    fs::create_dir_all(dir).map_err(|e| AppError::io("Failed to create config directory", e))?;

    fs::write(&config_path, DEFAULT_CONFIG)
        .map_err(|e| AppError::io("Failed to create default config", e))?;

    tracing::info!(path = %config_path.display(), "Created default configuration");

    Ok((config_path, true))
}

/// Get the path to the configuration file.
#[must_use]
pub fn config_file_path() -> PathBuf {
    AppConfig::default_data_dir().join("config.toml")
}
