//! Ordered buffer of encoded lines awaiting a flush

use std::collections::VecDeque;

/// Pending lines in enqueue order
#[derive(Debug, Default)]
pub struct LineBuffer {
    /// Encoded lines, oldest first
    lines: VecDeque<String>,
    /// Total payload size in bytes, excluding separators
    size_bytes: usize,
}

impl LineBuffer {
    /// Create a new empty line buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line at the back
    pub fn push(&mut self, line: String) {
        self.size_bytes += line.len();
        self.lines.push_back(line);
    }

    /// Remove up to `max` of the oldest lines, leaving the rest in place
    pub fn take_batch(&mut self, max: usize) -> Vec<String> {
        let n = max.min(self.lines.len());
        let batch: Vec<String> = self.lines.drain(..n).collect();
        self.size_bytes -= batch.iter().map(String::len).sum::<usize>();
        batch
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }
}
