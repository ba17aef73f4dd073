//! Configuration management for batchlog

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::logging::{
    ConfigError, Severity, DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_FILES, DEFAULT_MAX_FILE_SIZE,
    DEFAULT_PREFIX, DEFAULT_QUEUE_CAPACITY, DEFAULT_THRESHOLD,
};

/// Logger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Master switch for console echo and persistence
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Minimum severity written to file (default: debug)
    #[serde(default = "default_level")]
    pub level: Severity,

    /// Directory for log files; persistence is off when unset. `~` is expanded.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Log files kept before the oldest is evicted (default: 5)
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Size in bytes at which a file is rolled over (default: 1,000,000)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Lines buffered before a flush (default: 10)
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Pending writer tasks before log calls block (default: 1024)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Literal prepended to every message
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_enabled() -> bool {
    true
}

fn default_level() -> Severity {
    DEFAULT_THRESHOLD
}

fn default_max_files() -> usize {
    DEFAULT_MAX_FILES
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_buffer_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            level: default_level(),
            log_dir: None,
            max_files: default_max_files(),
            max_file_size: default_max_file_size(),
            buffer_capacity: default_buffer_capacity(),
            queue_capacity: default_queue_capacity(),
            prefix: default_prefix(),
        }
    }
}

impl Config {
    /// Load configuration from the default path, or defaults if not found
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `log_dir` with a leading `~` expanded to the home directory
    pub fn expanded_log_dir(&self) -> Option<PathBuf> {
        self.log_dir.as_ref().map(|dir| {
            let raw = dir.to_string_lossy();
            PathBuf::from(shellexpand::tilde(&raw).into_owned())
        })
    }
}

/// Get the base configuration directory (~/.batchlog)
/// Falls back to ./.batchlog if home directory cannot be determined
pub fn config_dir() -> PathBuf {
    try_config_dir().unwrap_or_else(|| {
        tracing::warn!("Could not determine home directory, using current directory for config");
        PathBuf::from(".batchlog")
    })
}

/// Try to get the base configuration directory, returning None if home dir is unavailable
pub fn try_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".batchlog"))
}

/// Get the path to the config file
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}
