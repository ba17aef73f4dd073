//! Asynchronous write pipeline
//!
//! Log calls hand formatted lines to a bounded queue drained by exactly one
//! worker thread. The worker owns the pending buffer and the rotation
//! manager, so buffer mutation and file I/O are serialized without locks and
//! lines reach disk in queue order. Directory changes travel through the same
//! queue, so they are ordered with the lines around them.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, error, warn};

use super::buffer::{PendingBuffer, DEFAULT_BUFFER_CAPACITY};
use super::file_store;
use super::record::LogLine;
use super::rotation::RotationManager;

/// Default number of tasks that may wait in the queue before callers block
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Name given to the worker thread
pub const WORKER_THREAD_NAME: &str = "batchlog-writer";

/// Work items processed by the worker, strictly in submission order
#[derive(Debug)]
pub enum LogTask {
    /// Buffer a line, flushing when the buffer fills up
    AppendLine(LogLine),
    /// Write out whatever is buffered
    FlushNow,
    /// Flush into the current directory, then switch to another one
    Retarget(RotationManager),
}

/// Sizing of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Lines buffered before a flush
    pub buffer_capacity: usize,
    /// Tasks queued before submitters block
    pub queue_capacity: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// State owned by the worker thread
#[derive(Debug)]
pub struct PipelineWorker {
    buffer: PendingBuffer,
    rotation: RotationManager,
}

impl PipelineWorker {
    pub fn new(rotation: RotationManager, buffer_capacity: usize) -> Self {
        Self {
            buffer: PendingBuffer::new(buffer_capacity),
            rotation,
        }
    }

    /// Process a single task
    pub fn handle(&mut self, task: LogTask) {
        match task {
            LogTask::AppendLine(line) => {
                if self.buffer.push(line) {
                    self.flush();
                }
            }
            LogTask::FlushNow => self.flush(),
            LogTask::Retarget(rotation) => {
                self.flush();
                debug!("Log writer switching to {}", rotation.dir().display());
                self.rotation = rotation;
            }
        }
    }

    /// Append everything buffered to the current target and clear the buffer
    ///
    /// An empty buffer is a no-op. If no target can be selected the batch is
    /// dropped so the buffer stays bounded.
    pub fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let content = self.buffer.drain_joined();
        match self.rotation.select_write_target() {
            Ok(target) => file_store::append_text(&content, &target),
            Err(e) => warn!(error = %e, "No log file available, dropping batch"),
        }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn rotation(&self) -> &RotationManager {
        &self.rotation
    }

    /// Drain the queue until every sender is gone, then flush what is left
    fn run(mut self, tasks: Receiver<LogTask>) {
        debug!("Starting log writer for {}", self.rotation.dir().display());

        for task in tasks.iter() {
            self.handle(task);
        }

        self.flush();
        debug!("Log writer for {} stopped", self.rotation.dir().display());
    }
}

/// Handle to a running pipeline
#[derive(Debug)]
pub struct Pipeline {
    sender: Option<Sender<LogTask>>,
    worker: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// Start the worker thread
    ///
    /// If the thread cannot be spawned the pipeline is inert: submissions are
    /// discarded and logging continues on the console only.
    pub fn spawn(rotation: RotationManager, settings: PipelineSettings) -> Self {
        let (sender, receiver) = bounded(settings.queue_capacity.max(1));
        let worker = PipelineWorker::new(rotation, settings.buffer_capacity);

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker.run(receiver));

        match handle {
            Ok(handle) => Self {
                sender: Some(sender),
                worker: Some(handle),
            },
            Err(e) => {
                error!("Failed to start log writer thread: {}", e);
                Self::detached()
            }
        }
    }

    /// A pipeline with no worker; every submission is discarded
    pub(super) fn detached() -> Self {
        Self {
            sender: None,
            worker: None,
        }
    }

    /// Queue a task, blocking while the queue is full
    pub fn submit(&self, task: LogTask) {
        if let Some(sender) = &self.sender {
            if sender.send(task).is_err() {
                debug!("Log writer has stopped, task discarded");
            }
        }
    }

    /// Ask the worker to flush; returns without waiting
    pub fn close(&self) {
        self.submit(LogTask::FlushNow);
    }

    /// Point the worker at another directory once everything queued so far
    /// has been flushed to the current one
    pub fn retarget(&self, rotation: RotationManager) {
        self.submit(LogTask::Retarget(rotation));
    }

    /// Whether a worker is attached and still accepting tasks
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Stop accepting tasks and wait for the worker to drain and flush
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // Dropping the sender lets the worker's receive loop end
        self.sender.take();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("Log writer thread panicked");
            }
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn line(n: usize) -> LogLine {
        LogLine::from(format!("line {}\n", n))
    }

    fn read_all_logs(dir: &Path) -> String {
        RotationManager::new(dir)
            .log_files()
            .unwrap()
            .into_iter()
            .map(|f| fs::read_to_string(f.path).unwrap())
            .collect()
    }

    #[test]
    fn test_worker_flushes_exactly_at_capacity() {
        let temp_dir = TempDir::new().unwrap();
        let mut worker = PipelineWorker::new(RotationManager::new(temp_dir.path()), 10);

        for n in 0..9 {
            worker.handle(LogTask::AppendLine(line(n)));
        }
        assert_eq!(worker.buffered(), 9);
        assert_eq!(read_all_logs(temp_dir.path()), "");

        worker.handle(LogTask::AppendLine(line(9)));
        assert_eq!(worker.buffered(), 0);

        let expected: String = (0..10).map(|n| line(n).into_string()).collect();
        assert_eq!(read_all_logs(temp_dir.path()), expected);
    }

    #[test]
    fn test_worker_buffer_never_exceeds_capacity() {
        let temp_dir = TempDir::new().unwrap();
        let mut worker = PipelineWorker::new(RotationManager::new(temp_dir.path()), 10);

        for n in 0..35 {
            worker.handle(LogTask::AppendLine(line(n)));
            assert!(worker.buffered() < 10);
        }
        assert_eq!(worker.buffered(), 5);
    }

    #[test]
    fn test_worker_flush_now_writes_partial_batch() {
        let temp_dir = TempDir::new().unwrap();
        let mut worker = PipelineWorker::new(RotationManager::new(temp_dir.path()), 10);

        worker.handle(LogTask::AppendLine(line(1)));
        worker.handle(LogTask::AppendLine(line(2)));
        worker.handle(LogTask::FlushNow);

        assert_eq!(worker.buffered(), 0);
        assert_eq!(read_all_logs(temp_dir.path()), "line 1\nline 2\n");
    }

    #[test]
    fn test_worker_empty_flush_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let mut worker = PipelineWorker::new(RotationManager::new(temp_dir.path()), 10);

        worker.handle(LogTask::FlushNow);

        assert!(worker.rotation().current_file().is_none());
        assert!(fs::read_dir(temp_dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_worker_drops_batch_when_dir_missing() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("gone");
        let mut worker = PipelineWorker::new(RotationManager::new(&dir), 2);

        worker.handle(LogTask::AppendLine(line(1)));
        worker.handle(LogTask::AppendLine(line(2)));

        assert_eq!(worker.buffered(), 0);
        assert!(!dir.exists());
    }

    #[test]
    fn test_worker_rolls_over_between_batches() {
        let temp_dir = TempDir::new().unwrap();
        // Every 7-byte batch fills a file, so each batch needs a new one
        let rotation = RotationManager::with_limits(temp_dir.path(), 5, 7);
        let mut worker = PipelineWorker::new(rotation, 1);

        worker.handle(LogTask::AppendLine(line(1)));
        worker.handle(LogTask::AppendLine(line(2)));
        worker.handle(LogTask::AppendLine(line(3)));

        let mut contents: Vec<String> = RotationManager::new(temp_dir.path())
            .log_files()
            .unwrap()
            .into_iter()
            .map(|f| fs::read_to_string(f.path).unwrap())
            .collect();
        contents.sort();
        assert_eq!(contents, vec!["line 1\n", "line 2\n", "line 3\n"]);
    }

    #[test]
    fn test_worker_retarget_flushes_before_switching() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let mut worker = PipelineWorker::new(RotationManager::new(first.path()), 10);

        worker.handle(LogTask::AppendLine(line(1)));
        worker.handle(LogTask::Retarget(RotationManager::new(second.path())));
        assert_eq!(worker.buffered(), 0);
        assert_eq!(worker.rotation().dir(), second.path());

        worker.handle(LogTask::AppendLine(line(2)));
        worker.handle(LogTask::FlushNow);

        assert_eq!(read_all_logs(first.path()), "line 1\n");
        assert_eq!(read_all_logs(second.path()), "line 2\n");
    }

    #[test]
    fn test_detached_pipeline_discards_tasks() {
        let pipeline = Pipeline::detached();
        assert!(!pipeline.is_running());

        pipeline.submit(LogTask::AppendLine(line(1)));
        pipeline.close();
        pipeline.shutdown();
    }

    #[test]
    fn test_pipeline_shutdown_flushes_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = Pipeline::spawn(
            RotationManager::new(temp_dir.path()),
            PipelineSettings {
                buffer_capacity: 10,
                queue_capacity: 4,
            },
        );
        assert!(pipeline.is_running());

        for n in 0..25 {
            pipeline.submit(LogTask::AppendLine(line(n)));
        }
        pipeline.close();
        pipeline.shutdown();

        let expected: String = (0..25).map(|n| line(n).into_string()).collect();
        assert_eq!(read_all_logs(temp_dir.path()), expected);
    }

    #[test]
    fn test_pipeline_drop_flushes_remaining_lines() {
        let temp_dir = TempDir::new().unwrap();
        {
            let pipeline =
                Pipeline::spawn(RotationManager::new(temp_dir.path()), PipelineSettings::default());
            pipeline.submit(LogTask::AppendLine(line(7)));
        }

        assert_eq!(read_all_logs(temp_dir.path()), "line 7\n");
    }
}
