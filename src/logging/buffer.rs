//! Pending lines waiting to be flushed
//!
//! Owned by the pipeline worker only, so it needs no locking.

use super::record::LogLine;

/// Default number of lines buffered before a flush
pub const DEFAULT_BUFFER_CAPACITY: usize = 10;

/// Ordered, bounded batch of formatted lines
#[derive(Debug)]
pub struct PendingBuffer {
    lines: Vec<LogLine>,
    capacity: usize,
}

impl PendingBuffer {
    /// Create a buffer that reports full after `capacity` lines (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a line, returning `true` once the buffer has reached capacity
    ///
    /// The caller is expected to flush as soon as this returns `true`, which
    /// keeps the length at or below capacity.
    pub fn push(&mut self, line: LogLine) -> bool {
        self.lines.push(line);
        self.is_full()
    }

    /// Concatenate all lines in insertion order and clear the buffer
    pub fn drain_joined(&mut self) -> String {
        let total = self.lines.iter().map(LogLine::len).sum();
        let mut joined = String::with_capacity(total);
        for line in self.lines.drain(..) {
            joined.push_str(line.as_str());
        }
        joined
    }

    pub fn is_full(&self) -> bool {
        self.lines.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for PendingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str) -> LogLine {
        LogLine::from(format!("{}\n", text))
    }

    #[test]
    fn test_push_reports_full_at_capacity() {
        let mut buffer = PendingBuffer::new(3);

        assert!(!buffer.push(line("a")));
        assert!(!buffer.push(line("b")));
        assert!(buffer.push(line("c")));
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_drain_joined_preserves_order_and_clears() {
        let mut buffer = PendingBuffer::default();
        buffer.push(line("first"));
        buffer.push(line("second"));
        buffer.push(line("third"));

        assert_eq!(buffer.drain_joined(), "first\nsecond\nthird\n");
        assert!(buffer.is_empty());
        assert_eq!(buffer.drain_joined(), "");
    }

    #[test]
    fn test_zero_capacity_is_normalised() {
        let mut buffer = PendingBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
        assert!(buffer.push(line("only")));
    }
}
