//! Error types for the gazetteer updater
//!
//! Task-level problems (failed downloads, rejected submissions, callback
//! timeouts) are handled inside the task loop and never surface here; these
//! errors cover the conditions that stop a run before or outside the loop.

use thiserror::Error;

/// Result type alias for updater operations
pub type Result<T> = std::result::Result<T, UpdateError>;

/// Error type for updater operations
#[derive(Error, Debug)]
pub enum UpdateError {
    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check the update config file.")]
    Config(String),

    /// A previous updater instance still owns the pid file
    #[error("Another updater instance is already running (pid {pid}). Remove the pid file if it is stale.")]
    InstanceRunning { pid: i32 },

    /// Callback listener failed to bind or serve
    #[error("Callback listener error: {0}. Check that the configured host and port are available.")]
    Listener(String),

    /// File system operation failed
    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("Network request failed: {0}. Check connectivity and the configured URLs.")]
    Http(#[from] reqwest::Error),

    /// YAML parsing failed
    #[error("Failed to parse YAML: {0}. Check the file syntax at the indicated line/column.")]
    YamlParse(#[from] serde_yaml::Error),

    /// Generic anyhow error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl UpdateError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a listener error
    pub fn listener(msg: impl Into<String>) -> Self {
        Self::Listener(msg.into())
    }
}
