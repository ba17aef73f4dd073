//! The logging subsystem
//!
//! A [`Logger`] is an owned handle: create one, configure it, share it by
//! reference (or `Arc`) with the code that logs, and shut it down on exit.
//! Several independent loggers can coexist, each with its own directory and
//! worker.
//!
//! Every enabled call is echoed to the console on the caller's thread.
//! Persistence is opt-in: only after [`Logger::set_persistence_directory`]
//! succeeds are calls at or above the severity threshold formatted and queued
//! for the background writer.

use std::error::Error;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, RwLock};

use tracing::info;

use super::console::{Console, ErrorChainRenderer, TraceRenderer, TracingConsole};
use super::error::ConfigError;
use super::level::Severity;
use super::pipeline::{LogTask, Pipeline, PipelineSettings};
use super::record::LogRecord;
use super::rotation::{RotationManager, DEFAULT_MAX_FILES, DEFAULT_MAX_FILE_SIZE};
use crate::config::Config;

/// Default literal prepended to every message
pub const DEFAULT_PREFIX: &str = "BATCHLOG:";

/// Default minimum severity that is persisted
pub const DEFAULT_THRESHOLD: Severity = Severity::Debug;

/// Builder for [`Logger`]
pub struct LoggerBuilder {
    console: Arc<dyn Console>,
    renderer: Box<dyn TraceRenderer>,
    prefix: String,
    enabled: bool,
    threshold: Severity,
    max_files: usize,
    max_file_size: u64,
    pipeline: PipelineSettings,
}

impl LoggerBuilder {
    fn new() -> Self {
        Self {
            console: Arc::new(TracingConsole),
            renderer: Box::new(ErrorChainRenderer),
            prefix: DEFAULT_PREFIX.to_string(),
            enabled: true,
            threshold: DEFAULT_THRESHOLD,
            max_files: DEFAULT_MAX_FILES,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            pipeline: PipelineSettings::default(),
        }
    }

    /// Where console echoes go
    pub fn console(mut self, console: Arc<dyn Console>) -> Self {
        self.console = console;
        self
    }

    /// How attached errors are rendered into persisted messages
    pub fn trace_renderer(mut self, renderer: impl TraceRenderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn severity_threshold(mut self, threshold: Severity) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.pipeline.buffer_capacity = capacity;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.pipeline.queue_capacity = capacity;
        self
    }

    pub fn build(self) -> Logger {
        Logger {
            enabled: AtomicBool::new(self.enabled),
            threshold: AtomicU8::new(self.threshold.value()),
            prefix: self.prefix,
            pid: std::process::id(),
            console: self.console,
            renderer: self.renderer,
            max_files: self.max_files,
            max_file_size: self.max_file_size,
            pipeline_settings: self.pipeline,
            pipeline: RwLock::new(None),
        }
    }
}

/// Console-mirroring logger with optional batched file persistence
pub struct Logger {
    enabled: AtomicBool,
    threshold: AtomicU8,
    prefix: String,
    pid: u32,
    console: Arc<dyn Console>,
    renderer: Box<dyn TraceRenderer>,
    max_files: usize,
    max_file_size: u64,
    pipeline_settings: PipelineSettings,
    pipeline: RwLock<Option<Pipeline>>,
}

impl Logger {
    /// Logger with defaults: enabled, DEBUG threshold, tracing console, no persistence
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    /// Build a logger from a loaded [`Config`]
    ///
    /// Fails when `log_dir` is set but is not an existing directory.
    pub fn from_config(config: &Config, console: Arc<dyn Console>) -> Result<Self, ConfigError> {
        let logger = Self::builder()
            .console(console)
            .prefix(config.prefix.clone())
            .enabled(config.enabled)
            .severity_threshold(config.level)
            .max_files(config.max_files)
            .max_file_size(config.max_file_size)
            .buffer_capacity(config.buffer_capacity)
            .queue_capacity(config.queue_capacity)
            .build();

        if let Some(dir) = config.expanded_log_dir() {
            logger.set_persistence_directory(dir)?;
        }
        Ok(logger)
    }

    /// Turn all logging (console and file) on or off
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Minimum severity written to file; the console still sees everything
    pub fn set_severity_threshold(&self, threshold: Severity) {
        self.threshold.store(threshold.value(), Ordering::Relaxed);
    }

    pub fn severity_threshold(&self) -> Severity {
        Severity::from_value(self.threshold.load(Ordering::Relaxed)).unwrap_or(DEFAULT_THRESHOLD)
    }

    /// Start persisting to `dir`, which must already exist
    ///
    /// Replaces any previous directory. The change is queued behind lines
    /// already submitted, which are flushed into the old directory first.
    pub fn set_persistence_directory(&self, dir: impl AsRef<Path>) -> Result<(), ConfigError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(ConfigError::InvalidDirectory(dir.to_path_buf()));
        }

        let rotation = RotationManager::with_limits(dir, self.max_files, self.max_file_size);

        let mut guard = match self.pipeline.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let stopped = match guard.as_ref() {
            Some(pipeline) if pipeline.is_running() => {
                pipeline.retarget(rotation);
                None
            }
            _ => guard.replace(Pipeline::spawn(rotation, self.pipeline_settings)),
        };
        drop(guard);
        drop(stopped);

        info!("Persisting logs to {}", dir.display());
        Ok(())
    }

    /// Whether lines at or above the threshold are currently reaching a writer
    pub fn is_persisting(&self) -> bool {
        self.pipeline
            .read()
            .map(|p| p.as_ref().is_some_and(Pipeline::is_running))
            .unwrap_or(false)
    }

    /// Request a flush of buffered lines; does not wait for it
    pub fn close(&self) {
        if let Ok(guard) = self.pipeline.read() {
            if let Some(pipeline) = guard.as_ref() {
                pipeline.close();
            }
        }
    }

    /// Flush, stop the writer and wait for it; persistence is off afterwards
    pub fn shutdown(&self) {
        let pipeline = match self.pipeline.write() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(pipeline) = pipeline {
            pipeline.shutdown();
        }
    }

    /// Single entry point behind every leveled call
    ///
    /// `Assert` is only reachable through here.
    pub fn log(
        &self,
        severity: Severity,
        tag: &str,
        message: &str,
        error: Option<&(dyn Error + 'static)>,
    ) {
        if !self.is_enabled() {
            return;
        }

        let message = format!("{}{}", self.prefix, message);
        self.console.log(severity, tag, &message, error);

        let message = match error {
            Some(e) => format!("{}\n{}", message, self.renderer.render(e)),
            None => message,
        };
        self.write_to_file_if_needed(severity, tag, message);
    }

    fn write_to_file_if_needed(&self, severity: Severity, tag: &str, message: String) {
        if severity < self.severity_threshold() {
            return;
        }

        let Ok(guard) = self.pipeline.read() else {
            return;
        };
        if let Some(pipeline) = guard.as_ref() {
            let record = LogRecord::at(chrono::Local::now(), self.pid, severity, tag, message);
            pipeline.submit(LogTask::AppendLine(record.to_line()));
        }
    }

    fn log_fmt(&self, severity: Severity, tag: &str, args: fmt::Arguments<'_>) {
        // Skip formatting entirely when disabled
        if !self.is_enabled() {
            return;
        }
        match args.as_str() {
            Some(s) => self.log(severity, tag, s, None),
            None => self.log(severity, tag, &args.to_string(), None),
        }
    }

    pub fn verbose(&self, tag: &str, message: &str) {
        self.log(Severity::Verbose, tag, message, None);
    }

    pub fn verbose_with_error(&self, tag: &str, message: &str, error: &(dyn Error + 'static)) {
        self.log(Severity::Verbose, tag, message, Some(error));
    }

    pub fn verbose_fmt(&self, tag: &str, args: fmt::Arguments<'_>) {
        self.log_fmt(Severity::Verbose, tag, args);
    }

    pub fn debug(&self, tag: &str, message: &str) {
        self.log(Severity::Debug, tag, message, None);
    }

    pub fn debug_with_error(&self, tag: &str, message: &str, error: &(dyn Error + 'static)) {
        self.log(Severity::Debug, tag, message, Some(error));
    }

    pub fn debug_fmt(&self, tag: &str, args: fmt::Arguments<'_>) {
        self.log_fmt(Severity::Debug, tag, args);
    }

    pub fn info(&self, tag: &str, message: &str) {
        self.log(Severity::Info, tag, message, None);
    }

    pub fn info_with_error(&self, tag: &str, message: &str, error: &(dyn Error + 'static)) {
        self.log(Severity::Info, tag, message, Some(error));
    }

    pub fn info_fmt(&self, tag: &str, args: fmt::Arguments<'_>) {
        self.log_fmt(Severity::Info, tag, args);
    }

    pub fn warn(&self, tag: &str, message: &str) {
        self.log(Severity::Warn, tag, message, None);
    }

    pub fn warn_with_error(&self, tag: &str, message: &str, error: &(dyn Error + 'static)) {
        self.log(Severity::Warn, tag, message, Some(error));
    }

    /// Warning that consists of the error alone
    pub fn warn_error(&self, tag: &str, error: &(dyn Error + 'static)) {
        self.log(Severity::Warn, tag, "", Some(error));
    }

    pub fn warn_fmt(&self, tag: &str, args: fmt::Arguments<'_>) {
        self.log_fmt(Severity::Warn, tag, args);
    }

    pub fn error(&self, tag: &str, message: &str) {
        self.log(Severity::Error, tag, message, None);
    }

    pub fn error_with_error(&self, tag: &str, message: &str, error: &(dyn Error + 'static)) {
        self.log(Severity::Error, tag, message, Some(error));
    }

    pub fn error_fmt(&self, tag: &str, args: fmt::Arguments<'_>) {
        self.log_fmt(Severity::Error, tag, args);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("enabled", &self.is_enabled())
            .field("threshold", &self.severity_threshold())
            .field("prefix", &self.prefix)
            .field("persisting", &self.is_persisting())
            .finish()
    }
}

/// `log_verbose!(logger, tag, "fmt", args..)`
#[macro_export]
macro_rules! log_verbose {
    ($logger:expr, $tag:expr, $($arg:tt)+) => {
        $logger.verbose_fmt($tag, format_args!($($arg)+))
    };
}

/// `log_debug!(logger, tag, "fmt", args..)`
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $tag:expr, $($arg:tt)+) => {
        $logger.debug_fmt($tag, format_args!($($arg)+))
    };
}

/// `log_info!(logger, tag, "fmt", args..)`
#[macro_export]
macro_rules! log_info {
    ($logger:expr, $tag:expr, $($arg:tt)+) => {
        $logger.info_fmt($tag, format_args!($($arg)+))
    };
}

/// `log_warn!(logger, tag, "fmt", args..)`
#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $tag:expr, $($arg:tt)+) => {
        $logger.warn_fmt($tag, format_args!($($arg)+))
    };
}

/// `log_error!(logger, tag, "fmt", args..)`
#[macro_export]
macro_rules! log_error {
    ($logger:expr, $tag:expr, $($arg:tt)+) => {
        $logger.error_fmt($tag, format_args!($($arg)+))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::console::MemoryConsole;
    use std::fs;
    use std::io;
    use std::thread;
    use tempfile::TempDir;

    fn test_logger(dir: &Path) -> (Logger, Arc<MemoryConsole>) {
        let console = Arc::new(MemoryConsole::new(1000));
        let logger = Logger::builder().console(console.clone()).build();
        logger.set_persistence_directory(dir).unwrap();
        (logger, console)
    }

    fn persisted(dir: &Path) -> String {
        RotationManager::new(dir)
            .log_files()
            .unwrap()
            .into_iter()
            .map(|f| fs::read_to_string(f.path).unwrap())
            .collect()
    }

    /// Strip the timestamp, leaving `"pid=.. tag: message"`
    fn bodies(content: &str) -> Vec<String> {
        content
            .lines()
            .filter(|l| l.contains(" pid="))
            .map(|l| l.splitn(3, ' ').nth(2).unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_defaults() {
        let logger = Logger::new();
        assert!(logger.is_enabled());
        assert_eq!(logger.severity_threshold(), Severity::Debug);
        assert!(!logger.is_persisting());
    }

    #[test]
    fn test_invalid_directory_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let logger = Logger::new();

        let missing = temp_dir.path().join("missing");
        assert!(matches!(
            logger.set_persistence_directory(&missing),
            Err(ConfigError::InvalidDirectory(_))
        ));

        let file = temp_dir.path().join("file");
        fs::write(&file, "").unwrap();
        assert!(logger.set_persistence_directory(&file).is_err());
        assert!(!logger.is_persisting());
    }

    #[test]
    fn test_console_echo_without_persistence() {
        let console = Arc::new(MemoryConsole::new(10));
        let logger = Logger::builder().console(console.clone()).build();

        logger.info("Net", "up");

        let entries = console.all_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].severity, Severity::Info);
        assert_eq!(entries[0].tag, "Net");
        assert_eq!(entries[0].message, "BATCHLOG:up");
    }

    #[test]
    fn test_disabled_logger_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let (logger, console) = test_logger(temp_dir.path());
        logger.set_enabled(false);

        logger.error("Net", "down");
        log_error!(logger, "Net", "down {}", 2);
        logger.shutdown();

        assert!(console.is_empty());
        assert_eq!(persisted(temp_dir.path()), "");
    }

    #[test]
    fn test_threshold_filters_persistence_only() {
        let temp_dir = TempDir::new().unwrap();
        let (logger, console) = test_logger(temp_dir.path());
        logger.set_severity_threshold(Severity::Warn);

        logger.debug("Db", "query");
        let error = io::Error::new(io::ErrorKind::TimedOut, "timed out");
        logger.error_with_error("Db", "failed", &error);
        logger.shutdown();

        assert_eq!(console.len(), 2);
        assert_eq!(
            bodies(&persisted(temp_dir.path())),
            vec![format!("pid={} Db: BATCHLOG:failed", std::process::id())]
        );
        assert!(persisted(temp_dir.path()).ends_with("Db: BATCHLOG:failed\ntimed out\n"));
    }

    #[test]
    fn test_close_flushes_partial_batch() {
        let temp_dir = TempDir::new().unwrap();
        let (logger, _console) = test_logger(temp_dir.path());

        for i in 0..9 {
            logger.info("T", &format!("{}", i));
        }
        logger.close();
        logger.shutdown();

        assert_eq!(bodies(&persisted(temp_dir.path())).len(), 9);
    }

    #[test]
    fn test_persisted_line_format() {
        let temp_dir = TempDir::new().unwrap();
        let (logger, _console) = test_logger(temp_dir.path());

        log_info!(logger, "Fmt", "{} + {} = {}", 1, 2, 3);
        logger.shutdown();

        let content = persisted(temp_dir.path());
        let line = content.lines().next().unwrap();
        // "MM-dd HH:mm:ss.SSS pid=<pid> Fmt: BATCHLOG:1 + 2 = 3"
        let (date, rest) = line.split_at(18);
        assert_eq!(date.len(), 18);
        assert_eq!(&date[2..3], "-");
        assert_eq!(&date[14..15], ".");
        assert_eq!(
            rest,
            format!(" pid={} Fmt: BATCHLOG:1 + 2 = 3", std::process::id())
        );
    }

    #[test]
    fn test_all_shapes_reach_file() {
        let temp_dir = TempDir::new().unwrap();
        let (logger, console) = test_logger(temp_dir.path());
        logger.set_severity_threshold(Severity::Verbose);
        let error = io::Error::new(io::ErrorKind::Other, "oops");

        logger.verbose("V", "a");
        logger.verbose_with_error("V", "b", &error);
        log_verbose!(logger, "V", "c{}", 1);
        logger.debug("D", "a");
        logger.debug_with_error("D", "b", &error);
        log_debug!(logger, "D", "c{}", 2);
        logger.info("I", "a");
        logger.info_with_error("I", "b", &error);
        log_info!(logger, "I", "c{}", 3);
        logger.warn("W", "a");
        logger.warn_with_error("W", "b", &error);
        logger.warn_error("W", &error);
        log_warn!(logger, "W", "c{}", 4);
        logger.error("E", "a");
        logger.error_with_error("E", "b", &error);
        log_error!(logger, "E", "c{}", 5);
        logger.log(Severity::Assert, "A", "never", None);
        logger.shutdown();

        assert_eq!(console.len(), 17);
        let pid = std::process::id();
        let bodies = bodies(&persisted(temp_dir.path()));
        assert_eq!(bodies.len(), 17);
        assert_eq!(bodies[0], format!("pid={} V: BATCHLOG:a", pid));
        assert_eq!(bodies[11], format!("pid={} W: BATCHLOG:", pid));
        assert_eq!(bodies[16], format!("pid={} A: BATCHLOG:never", pid));
    }

    #[test]
    fn test_order_preserved_across_rollover() {
        let temp_dir = TempDir::new().unwrap();
        let logger = Logger::builder()
            .console(Arc::new(MemoryConsole::new(0)))
            .max_file_size(2_000)
            .max_files(100)
            .build();
        logger.set_persistence_directory(temp_dir.path()).unwrap();

        for i in 0..200 {
            logger.info("Seq", &format!("{:04}", i));
        }
        logger.shutdown();

        // Order files by their first sequence number (creation order)
        let mut files: Vec<Vec<String>> = RotationManager::new(temp_dir.path())
            .log_files()
            .unwrap()
            .into_iter()
            .map(|f| bodies(&fs::read_to_string(f.path).unwrap()))
            .filter(|b| !b.is_empty())
            .collect();
        assert!(files.len() > 1);
        files.sort_by(|a, b| a[0].cmp(&b[0]));

        let pid = std::process::id();
        let expected: Vec<String> = (0..200)
            .map(|i| format!("pid={} Seq: BATCHLOG:{:04}", pid, i))
            .collect();
        assert_eq!(files.concat(), expected);
    }

    #[test]
    fn test_concurrent_callers_lose_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let console = Arc::new(MemoryConsole::new(0));
        let logger = Arc::new(
            Logger::builder()
                .console(console)
                .queue_capacity(2)
                .build(),
        );
        logger.set_persistence_directory(temp_dir.path()).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let logger = Arc::clone(&logger);
                thread::spawn(move || {
                    for i in 0..50 {
                        logger.info(&format!("T{}", t), &format!("{:02}", i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        logger.shutdown();

        let bodies = bodies(&persisted(temp_dir.path()));
        assert_eq!(bodies.len(), 200);

        // Each thread's own lines keep their relative order
        for t in 0..4 {
            let tag = format!(" T{}: ", t);
            let own: Vec<&String> = bodies.iter().filter(|b| b.contains(&tag)).collect();
            assert_eq!(own.len(), 50);
            for (i, body) in own.iter().enumerate() {
                assert!(body.ends_with(&format!("BATCHLOG:{:02}", i)));
            }
        }
    }

    #[test]
    fn test_switching_directory_flushes_old_one() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let (logger, _console) = test_logger(first.path());

        logger.info("T", "one");
        logger.set_persistence_directory(second.path()).unwrap();
        logger.info("T", "two");
        logger.shutdown();

        assert!(persisted(first.path()).ends_with("T: BATCHLOG:one\n"));
        assert!(persisted(second.path()).ends_with("T: BATCHLOG:two\n"));
    }

    #[test]
    fn test_resetting_directory_keeps_total_order() {
        let temp_dir = TempDir::new().unwrap();
        let logger = Arc::new(
            Logger::builder()
                .console(Arc::new(MemoryConsole::new(0)))
                .queue_capacity(4)
                .build(),
        );
        logger.set_persistence_directory(temp_dir.path()).unwrap();

        let writer = {
            let logger = Arc::clone(&logger);
            thread::spawn(move || {
                for i in 0..500 {
                    logger.info("Seq", &format!("{:04}", i));
                }
            })
        };
        for _ in 0..50 {
            logger.set_persistence_directory(temp_dir.path()).unwrap();
            thread::yield_now();
        }
        writer.join().unwrap();
        logger.shutdown();

        let pid = std::process::id();
        let expected: Vec<String> = (0..500)
            .map(|i| format!("pid={} Seq: BATCHLOG:{:04}", pid, i))
            .collect();
        assert_eq!(bodies(&persisted(temp_dir.path())), expected);
    }

    #[test]
    fn test_dead_writer_is_not_persisting() {
        let temp_dir = TempDir::new().unwrap();
        let (logger, _console) = test_logger(temp_dir.path());
        assert!(logger.is_persisting());

        // Same state as a writer thread that failed to start
        *logger.pipeline.write().unwrap() = Some(Pipeline::detached());
        assert!(!logger.is_persisting());
        logger.info("T", "dropped");

        logger.set_persistence_directory(temp_dir.path()).unwrap();
        assert!(logger.is_persisting());
        logger.info("T", "kept");
        logger.shutdown();

        assert_eq!(
            bodies(&persisted(temp_dir.path())),
            vec![format!("pid={} T: BATCHLOG:kept", std::process::id())]
        );
    }

    #[test]
    fn test_custom_trace_renderer() {
        struct Fixed;
        impl TraceRenderer for Fixed {
            fn render(&self, _error: &(dyn Error + 'static)) -> String {
                "\tat frame0".to_string()
            }
        }

        let temp_dir = TempDir::new().unwrap();
        let logger = Logger::builder()
            .console(Arc::new(MemoryConsole::new(0)))
            .trace_renderer(Fixed)
            .prefix("")
            .build();
        logger.set_persistence_directory(temp_dir.path()).unwrap();

        let error = io::Error::new(io::ErrorKind::Other, "ignored");
        logger.error_with_error("T", "crash", &error);
        logger.shutdown();

        assert!(persisted(temp_dir.path()).ends_with("T: crash\n\tat frame0\n"));
    }
}
