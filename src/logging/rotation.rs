//! Log file rotation
//!
//! Chooses the file the next batch is appended to. Files live in a single
//! directory and are recognised by name (`log*.txt`, case-insensitive). The
//! directory listing is the source of truth; the cached current file is only
//! trusted while it stays below the size cap.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use tracing::{debug, info};

use super::error::RotationError;
use super::file_store;

/// Default maximum number of log files kept in the directory
pub const DEFAULT_MAX_FILES: usize = 5;

/// Default maximum size of a single log file, in bytes
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1_000_000;

/// Timestamp format embedded in new file names
pub const FILE_NAME_DATE_FORMAT: &str = "%m-%d-%H-%M";

/// Check whether a file name belongs to the rotation set
pub fn is_log_file_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.starts_with("log") && lower.ends_with(".txt")
}

/// Name of a fresh log file created at `now`
pub fn new_file_name(now: DateTime<Local>) -> String {
    format!("Log{}.txt", now.format(FILE_NAME_DATE_FORMAT))
}

/// A log file seen in the directory listing
#[derive(Debug, Clone)]
pub struct LogFile {
    pub path: PathBuf,
    pub len: u64,
    pub modified: SystemTime,
}

/// Owns the size/count policy over one log directory
#[derive(Debug)]
pub struct RotationManager {
    dir: PathBuf,
    max_files: usize,
    max_file_size: u64,
    current: Option<PathBuf>,
}

impl RotationManager {
    /// Create a manager with the default limits
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_limits(dir, DEFAULT_MAX_FILES, DEFAULT_MAX_FILE_SIZE)
    }

    /// Create a manager with explicit limits
    pub fn with_limits(dir: impl Into<PathBuf>, max_files: usize, max_file_size: u64) -> Self {
        Self {
            dir: dir.into(),
            max_files,
            max_file_size,
            current: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The cached target, if one has been selected
    pub fn current_file(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    /// Pick the file the next batch should be appended to
    ///
    /// Reuses the cached file while it is below the size cap. Otherwise the
    /// directory is rescanned: when it already holds more than `max_files`
    /// log files the single oldest one is evicted, then the newest remaining
    /// file is reused if it has room, else a new dated file is created.
    pub fn select_write_target(&mut self) -> Result<PathBuf, RotationError> {
        if let Some(current) = &self.current {
            if let Ok(metadata) = fs::metadata(current) {
                if metadata.is_file() && metadata.len() < self.max_file_size {
                    return Ok(current.clone());
                }
            }
        }

        let target = self.rescan()?;
        self.current = Some(target.clone());
        Ok(target)
    }

    fn rescan(&mut self) -> Result<PathBuf, RotationError> {
        let mut files = self.log_files()?;

        if files.is_empty() {
            return self.create_new_file();
        }

        // Soft cap: only evict once the set is already over the limit
        if files.len() > self.max_files {
            let oldest = files.remove(0);
            info!("Evicting oldest log file {}", oldest.path.display());
            file_store::delete(&oldest.path);
        }

        match files.last() {
            Some(newest) if newest.len < self.max_file_size => Ok(newest.path.clone()),
            _ => self.create_new_file(),
        }
    }

    /// List the rotation set, oldest first by modification time
    ///
    /// The sort is stable, so files sharing a timestamp keep their listing
    /// order within one call.
    pub fn log_files(&self) -> Result<Vec<LogFile>, RotationError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| RotationError::ListDir {
            dir: self.dir.clone(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| RotationError::ListDir {
                dir: self.dir.clone(),
                source,
            })?;

            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !is_log_file_name(name) {
                continue;
            }

            // Entries can vanish between listing and stat; skip them
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if metadata.is_dir() {
                continue;
            }

            files.push(LogFile {
                path: entry.path(),
                len: metadata.len(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }

        files.sort_by_key(|f| f.modified);
        Ok(files)
    }

    fn create_new_file(&self) -> Result<PathBuf, RotationError> {
        let base = new_file_name(Local::now());
        let mut path = self.dir.join(&base);

        // A full file or a non-file entry may already own this minute's name
        let stem = base.trim_end_matches(".txt");
        let mut attempt = 0u32;
        while is_taken(&path, self.max_file_size) {
            attempt += 1;
            path = self.dir.join(format!("{}-{}.txt", stem, attempt));
        }

        debug!("Rolling over to {}", path.display());
        file_store::create_file(&path).ok_or(RotationError::CreateFile(path))
    }
}

/// Whether `path` can't serve as a fresh target: it is a full regular file,
/// or something other than a regular file (directory, symlink, ...)
fn is_taken(path: &Path, max_file_size: u64) -> bool {
    fs::symlink_metadata(path)
        .map(|m| !m.is_file() || m.len() >= max_file_size)
        .unwrap_or(false)
}
