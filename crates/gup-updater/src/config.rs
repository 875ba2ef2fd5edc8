//! Updater configuration
//!
//! The YAML config describes one batch run: global settings (base directory,
//! remote API endpoint and credentials, callback listener address, policy
//! defaults) plus an ordered list of per-region import tasks. Tasks can also
//! live in a separate YAML file referenced by `tasks_file`, which keeps large
//! region lists out of the main config.
//!
//! Loading resolves every relative path against the config file's directory,
//! so the core only ever sees a fully-resolved configuration.

use crate::error::{Result, UpdateError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_base() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8001
}

fn default_true() -> bool {
    true
}

fn default_timeout_hours() -> f64 {
    1.0
}

fn default_pid_file() -> PathBuf {
    PathBuf::from("gazetteer-update.pid")
}

fn default_timestamps() -> PathBuf {
    PathBuf::from("timestamps.html")
}

fn default_api_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_api_user() -> String {
    "admin".to_string()
}

fn default_region() -> String {
    "TMP".to_string()
}

/// Remote indexing API endpoint and credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the gazetteer API
    #[serde(default = "default_api_url")]
    pub url: String,
    /// Basic-auth user
    #[serde(default = "default_api_user")]
    pub user: String,
    /// Basic-auth password
    #[serde(default)]
    pub pass: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            user: default_api_user(),
            pass: String::new(),
        }
    }
}

/// One import task, driving exactly one iteration of the task loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Region identifier, used for the dump file name and callback routing
    #[serde(default = "default_region")]
    pub region: String,
    /// URL of the dump to download; without it the task goes straight to
    /// submission
    #[serde(default)]
    pub dump_src: Option<String>,
    /// URL of a timestamp marker appended to the timestamp log
    #[serde(default)]
    pub dump_ts: Option<String>,
    /// Ask the remote service to drop and reinitialize the index
    #[serde(default)]
    pub drop: bool,
    /// Wait window in hours, overriding the global default
    #[serde(default)]
    pub timeout: Option<f64>,
    /// Overrides the global overwrite policy for an existing dump
    #[serde(default)]
    pub force_dump_reload: Option<bool>,
}

impl Default for Task {
    fn default() -> Self {
        Self {
            region: default_region(),
            dump_src: None,
            dump_ts: None,
            drop: false,
            timeout: None,
            force_dump_reload: None,
        }
    }
}

/// Top-level updater configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Base directory for downloaded dumps (`<base>/dumps/<region>.json.gz`)
    #[serde(default = "default_base")]
    pub base: PathBuf,

    /// Host the callback listener binds to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the callback listener binds to (0 picks a free port)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Externally reachable callback base URL. When absent it is derived
    /// from the listener's actual bound address.
    #[serde(default)]
    pub callback_url: Option<String>,

    /// Remote indexing API
    #[serde(default)]
    pub gazetteer_api: ApiConfig,

    /// Whether an existing dump file is re-downloaded by default
    #[serde(default = "default_true")]
    pub force_dump_reload: bool,

    /// Default wait window in hours for import completion
    #[serde(default = "default_timeout_hours")]
    pub timeout: f64,

    /// Single-instance lock file
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,

    /// Timestamp log written across the batch
    #[serde(default = "default_timestamps")]
    pub timestamps: PathBuf,

    /// Ordered list of import tasks
    #[serde(default)]
    pub tasks: Vec<Task>,

    /// Optional YAML file with additional tasks, appended to `tasks`
    #[serde(default)]
    pub tasks_file: Option<PathBuf>,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            base: default_base(),
            host: default_host(),
            port: default_port(),
            callback_url: None,
            gazetteer_api: ApiConfig::default(),
            force_dump_reload: true,
            timeout: default_timeout_hours(),
            pid_file: default_pid_file(),
            timestamps: default_timestamps(),
            tasks: Vec::new(),
            tasks_file: None,
        }
    }
}

impl UpdateConfig {
    /// Load and fully resolve the configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            UpdateError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config: UpdateConfig = serde_yaml::from_str(&text)?;

        let config_dir = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(config_dir);

        if let Some(ref tasks_file) = config.tasks_file {
            let text = std::fs::read_to_string(tasks_file).map_err(|e| {
                UpdateError::config(format!("cannot read {}: {}", tasks_file.display(), e))
            })?;
            let extra: Vec<Task> = serde_yaml::from_str(&text)?;
            config.tasks.extend(extra);
        }

        config.validate()?;
        Ok(config)
    }

    /// Resolve relative path entries against the config file's directory
    fn resolve_paths(&mut self, dir: &Path) {
        if self.base.is_relative() {
            self.base = dir.join(&self.base);
        }
        if self.pid_file.is_relative() {
            self.pid_file = dir.join(&self.pid_file);
        }
        if self.timestamps.is_relative() {
            self.timestamps = dir.join(&self.timestamps);
        }
        if let Some(ref mut tasks_file) = self.tasks_file {
            if tasks_file.is_relative() {
                *tasks_file = dir.join(&tasks_file);
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.base.as_os_str().is_empty() {
            anyhow::bail!("base directory cannot be empty");
        }
        if self.gazetteer_api.url.is_empty() {
            anyhow::bail!("gazetteer_api.url cannot be empty");
        }
        if self.timeout <= 0.0 {
            anyhow::bail!("timeout must be a positive number of hours");
        }
        for task in &self.tasks {
            if task.region.is_empty() {
                anyhow::bail!("task region cannot be empty");
            }
            if let Some(timeout) = task.timeout {
                if timeout <= 0.0 {
                    anyhow::bail!(
                        "task {} timeout must be a positive number of hours",
                        task.region
                    );
                }
            }
        }
        Ok(())
    }

    /// Local path the region's dump is downloaded to and imported from
    pub fn dump_path(&self, region: &str) -> PathBuf {
        self.base.join("dumps").join(format!("{}.json.gz", region))
    }

    /// Effective wait window for a task
    pub fn timeout_for(&self, task: &Task) -> Duration {
        let hours = task.timeout.unwrap_or(self.timeout);
        Duration::from_secs_f64(hours * 3600.0)
    }

    /// Effective overwrite policy for a task
    pub fn force_reload_for(&self, task: &Task) -> bool {
        task.force_dump_reload.unwrap_or(self.force_dump_reload)
    }
}
