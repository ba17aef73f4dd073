//! Error types surfaced by the logging subsystem
//!
//! Only configuration problems ever reach a caller. Rotation errors stay
//! inside the worker, which logs them and skips the flush.

use std::io;
use std::path::PathBuf;

/// Errors raised while configuring a logger
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Log directory does not exist or is not a directory: {}", .0.display())]
    InvalidDirectory(PathBuf),

    #[error("Failed to read config file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config file {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write config file {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors raised while choosing the file to append to
#[derive(Debug, thiserror::Error)]
pub enum RotationError {
    #[error("Failed to list log directory {}", .dir.display())]
    ListDir {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to create log file {}", .0.display())]
    CreateFile(PathBuf),
}
