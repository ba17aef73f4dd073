//! Console echo and error rendering
//!
//! Every enabled log call is echoed synchronously to a [`Console`] before
//! anything is queued for persistence. The default console forwards to
//! `tracing`; [`MemoryConsole`] keeps recent echoes in memory for display or
//! inspection.

use std::collections::VecDeque;
use std::error::Error;
use std::sync::RwLock;

use chrono::{DateTime, Local};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use super::level::Severity;

/// Destination for the synchronous console echo
pub trait Console: Send + Sync {
    /// Render one call; the result is ignored by the logger
    fn log(&self, severity: Severity, tag: &str, message: &str, error: Option<&(dyn Error + 'static)>);
}

/// Console that emits `tracing` events
///
/// `Verbose` maps to TRACE and `Assert` to ERROR.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingConsole;

impl Console for TracingConsole {
    fn log(&self, severity: Severity, tag: &str, message: &str, error: Option<&(dyn Error + 'static)>) {
        match (severity, error) {
            (Severity::Verbose, None) => tracing::trace!(tag, "{}", message),
            (Severity::Verbose, Some(e)) => tracing::trace!(tag, error = e, "{}", message),
            (Severity::Debug, None) => tracing::debug!(tag, "{}", message),
            (Severity::Debug, Some(e)) => tracing::debug!(tag, error = e, "{}", message),
            (Severity::Info, None) => tracing::info!(tag, "{}", message),
            (Severity::Info, Some(e)) => tracing::info!(tag, error = e, "{}", message),
            (Severity::Warn, None) => tracing::warn!(tag, "{}", message),
            (Severity::Warn, Some(e)) => tracing::warn!(tag, error = e, "{}", message),
            (Severity::Error | Severity::Assert, None) => tracing::error!(tag, "{}", message),
            (Severity::Error | Severity::Assert, Some(e)) => {
                tracing::error!(tag, error = e, "{}", message)
            }
        }
    }
}

/// Install a stderr `tracing` subscriber for [`TracingConsole`]
///
/// Honors `RUST_LOG`, falling back to `default_filter`. Returns `false` when
/// a global subscriber was already set.
pub fn init_console_tracing(default_filter: &str) -> bool {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()
        .is_ok()
}

/// A console echo kept by [`MemoryConsole`]
#[derive(Debug, Clone)]
pub struct ConsoleEntry {
    /// Timestamp when the echo was recorded
    pub timestamp: DateTime<Local>,
    pub severity: Severity,
    pub tag: String,
    pub message: String,
    /// Display form of the attached error, if any
    pub error: Option<String>,
}

/// Thread-safe ring buffer of console echoes
pub struct MemoryConsole {
    /// All echoes (capped at max_entries)
    entries: RwLock<VecDeque<ConsoleEntry>>,
    max_entries: usize,
}

impl MemoryConsole {
    /// Create a console keeping the last `max_entries` echoes
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(max_entries)),
            max_entries,
        }
    }

    fn push(&self, entry: ConsoleEntry) {
        if self.max_entries == 0 {
            return;
        }
        if let Ok(mut entries) = self.entries.write() {
            if entries.len() >= self.max_entries {
                entries.pop_front();
            }
            entries.push_back(entry);
        }
    }

    /// Get all entries, oldest first
    pub fn all_entries(&self) -> Vec<ConsoleEntry> {
        self.entries
            .read()
            .map(|e| e.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Console for MemoryConsole {
    fn log(&self, severity: Severity, tag: &str, message: &str, error: Option<&(dyn Error + 'static)>) {
        self.push(ConsoleEntry {
            timestamp: Local::now(),
            severity,
            tag: tag.to_string(),
            message: message.to_string(),
            error: error.map(|e| e.to_string()),
        });
    }
}

/// Turns an error into the text appended to a persisted message
pub trait TraceRenderer: Send + Sync {
    fn render(&self, error: &(dyn Error + 'static)) -> String;
}

/// Renders the error followed by one `Caused by:` line per source
#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorChainRenderer;

impl TraceRenderer for ErrorChainRenderer {
    fn render(&self, error: &(dyn Error + 'static)) -> String {
        let mut rendered = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            rendered.push_str("\nCaused by: ");
            rendered.push_str(&cause.to_string());
            source = cause.source();
        }
        rendered
    }
}
