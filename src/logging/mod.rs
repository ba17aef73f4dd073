//! Logging system for batchlog
//!
//! Console-mirrored logging with an asynchronous, batched write path into
//! size- and count-capped rotating files.

mod buffer;
mod console;
mod error;
pub mod file_store;
mod level;
mod logger;
mod pipeline;
mod record;
mod rotation;

pub use buffer::{PendingBuffer, DEFAULT_BUFFER_CAPACITY};
pub use console::{
    init_console_tracing, Console, ConsoleEntry, ErrorChainRenderer, MemoryConsole,
    TraceRenderer, TracingConsole,
};
pub use error::{ConfigError, RotationError};
pub use level::{ParseSeverityError, Severity};
pub use logger::{Logger, LoggerBuilder, DEFAULT_PREFIX, DEFAULT_THRESHOLD};
pub use pipeline::{
    LogTask, Pipeline, PipelineSettings, PipelineWorker, DEFAULT_QUEUE_CAPACITY,
    WORKER_THREAD_NAME,
};
pub use record::{LogLine, LogRecord, LINE_TIMESTAMP_FORMAT};
pub use rotation::{
    is_log_file_name, new_file_name, LogFile, RotationManager, DEFAULT_MAX_FILES,
    DEFAULT_MAX_FILE_SIZE, FILE_NAME_DATE_FORMAT,
};
