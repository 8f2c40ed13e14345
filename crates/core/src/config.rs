//! Client configuration via `gridwire.toml`
//!
//! A single TOML file carries the settings that the POF context, daemons and
//! queues read at construction time. On first use a commented default file
//! can be written next to the application; edit it and restart to change
//! behavior.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name.
pub const CONFIG_FILE_NAME: &str = "gridwire.toml";

/// Default daemon thread name.
pub const DEFAULT_THREAD_NAME: &str = "gridwire-daemon";

/// POF serialization settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PofConfig {
    /// Track object identities so that shared and cyclic graphs round-trip.
    #[serde(default)]
    pub reference_enabled: bool,
}

/// Daemon settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Name given to the worker thread.
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
    /// Milliseconds to wait per `on_wait` call; 0 waits until notified,
    /// negative never waits.
    #[serde(default)]
    pub wait_millis: i64,
}

fn default_thread_name() -> String {
    DEFAULT_THREAD_NAME.to_string()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            thread_name: default_thread_name(),
            wait_millis: 0,
        }
    }
}

/// Queue settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueConfig {
    /// Number of inserts between automatic consumer notifications.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    1
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

/// Client configuration loaded from `gridwire.toml`.
///
/// # Example
///
/// ```toml
/// [pof]
/// reference_enabled = true
///
/// [daemon]
/// thread_name = "cache-events"
/// wait_millis = 0
///
/// [queue]
/// batch_size = 8
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct GridwireConfig {
    /// POF settings.
    #[serde(default)]
    pub pof: PofConfig,
    /// Daemon settings.
    #[serde(default)]
    pub daemon: DaemonConfig,
    /// Queue settings.
    #[serde(default)]
    pub queue: QueueConfig,
}

impl GridwireConfig {
    /// Check the configured values for consistency.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the batch size is zero or the thread name is empty.
    pub fn validate(&self) -> Result<()> {
        if self.queue.batch_size == 0 {
            return Err(Error::config("queue.batch_size must be at least 1"));
        }
        if self.daemon.thread_name.trim().is_empty() {
            return Err(Error::config("daemon.thread_name must not be empty"));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Gridwire client configuration

[pof]
# Track object identity so shared references and cycles survive a
# round-trip (default: false). Evolvable objects never use references.
reference_enabled = false

[daemon]
# Worker thread name.
thread_name = "gridwire-daemon"
# Milliseconds per wait; 0 = wait until notified, negative = never wait.
wait_millis = 0

[queue]
# Notify the consumer once every `batch_size` inserts (default: 1).
batch_size = 1
"#
    }

    /// Parse config from a TOML string and validate it.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: GridwireConfig = toml::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content).map_err(|e| {
            Error::config(format!("Invalid config file '{}': {}", path.display(), e))
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
