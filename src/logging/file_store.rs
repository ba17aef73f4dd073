//! Primitive file operations used by the rotation layer
//!
//! Nothing in here returns an error to the caller: failures are reported via
//! `tracing` and turned into a `false` / `None` result so that logging can
//! never bring down the host application.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Categories of disk errors for user-friendly messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskErrorKind {
    /// Disk is full or quota exceeded
    DiskFull,
    /// Permission denied (read or write)
    PermissionDenied,
    /// File or directory not found
    NotFound,
    /// Other IO error
    Other,
}

impl DiskErrorKind {
    /// Get a user-friendly message for this error kind
    pub fn user_message(&self) -> &'static str {
        match self {
            DiskErrorKind::DiskFull => "disk full",
            DiskErrorKind::PermissionDenied => "permission denied",
            DiskErrorKind::NotFound => "file or directory not found",
            DiskErrorKind::Other => "I/O error",
        }
    }
}

/// Categorize an IO error into a user-friendly category
pub fn categorize_io_error(e: &io::Error) -> DiskErrorKind {
    use std::io::ErrorKind;

    match e.kind() {
        ErrorKind::WriteZero => DiskErrorKind::DiskFull,
        ErrorKind::PermissionDenied => DiskErrorKind::PermissionDenied,
        ErrorKind::NotFound => DiskErrorKind::NotFound,
        _ => {
            #[cfg(unix)]
            {
                if let Some(os_error) = e.raw_os_error() {
                    // ENOSPC = 28, EDQUOT = 122 (Linux) / 69 (macOS)
                    if os_error == 28 || os_error == 122 || os_error == 69 {
                        return DiskErrorKind::DiskFull;
                    }
                    // EACCES
                    if os_error == 13 {
                        return DiskErrorKind::PermissionDenied;
                    }
                }
            }
            DiskErrorKind::Other
        }
    }
}

/// Create a user-friendly error message from an IO error
pub fn friendly_io_error_message(e: &io::Error, context: &str) -> String {
    match categorize_io_error(e) {
        DiskErrorKind::Other => format!("{}: {}", context, e),
        kind => format!("{}: {}", context, kind.user_message()),
    }
}

/// Recursively delete a file or directory
///
/// Returns `true` when nothing remains at `path`, including when it never
/// existed. An empty path is treated as absent. For directories every child
/// is deleted first; the first child that cannot be removed aborts the walk
/// and leaves the directory in place.
pub fn delete(path: &Path) -> bool {
    delete_with(path, &mut |file| fs::remove_file(file))
}

/// [`delete`] with the removal of non-directory entries supplied by the caller
fn delete_with<F>(path: &Path, remove_file: &mut F) -> bool
where
    F: FnMut(&Path) -> io::Result<()>,
{
    if path.as_os_str().is_empty() {
        return true;
    }

    // symlink_metadata so that links are removed rather than followed
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return true,
        Err(e) => {
            warn!("{}", friendly_io_error_message(&e, &format!("Failed to stat {}", path.display())));
            return false;
        }
    };

    if metadata.is_dir() {
        let entries = match fs::read_dir(path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    "{}",
                    friendly_io_error_message(&e, &format!("Failed to list {}", path.display()))
                );
                return false;
            }
        };

        for entry in entries {
            let child = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    warn!(
                        "{}",
                        friendly_io_error_message(&e, &format!("Failed to list {}", path.display()))
                    );
                    return false;
                }
            };
            if !delete_with(&child, remove_file) {
                return false;
            }
        }

        remove_reporting(path, fs::remove_dir(path))
    } else {
        remove_reporting(path, remove_file(path))
    }
}

fn remove_reporting(path: &Path, result: io::Result<()>) -> bool {
    match result {
        Ok(()) => true,
        // Removed by someone else in the meantime
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!(
                "{}",
                friendly_io_error_message(&e, &format!("Failed to delete {}", path.display()))
            );
            false
        }
    }
}

/// Create an empty file, or return the existing one untouched
///
/// Missing parent directories are created. Returns `None` when the path is
/// empty, names a directory, or the file cannot be created; callers treat
/// that as "try another target", never as fatal.
pub fn create_file(path: &Path) -> Option<PathBuf> {
    if path.as_os_str().is_empty() {
        return None;
    }

    if path.is_file() {
        return Some(path.to_path_buf());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.is_dir() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(
                    "{}",
                    friendly_io_error_message(
                        &e,
                        &format!("Failed to create directory {}", parent.display())
                    )
                );
                return None;
            }
        }
    }

    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => {
            debug!("Created log file {}", path.display());
            Some(path.to_path_buf())
        }
        // Lost a race with another creator; the file is usable as long as it is a file
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_file() => {
            Some(path.to_path_buf())
        }
        Err(e) => {
            warn!(
                "{}",
                friendly_io_error_message(&e, &format!("Failed to create {}", path.display()))
            );
            None
        }
    }
}

/// Append `content` to the file at `path`, creating it if needed
///
/// The handle is flushed and closed before returning on every path. Errors
/// are logged and swallowed.
pub fn append_text(content: &str, path: &Path) {
    if let Err(e) = try_append(content, path) {
        warn!(
            "{}",
            friendly_io_error_message(&e, &format!("Failed to write log file {}", path.display()))
        );
    }
}

fn try_append(content: &str, path: &Path) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(content.as_bytes())?;
    file.flush()
    // file is closed when dropped, including on the error paths above
}
