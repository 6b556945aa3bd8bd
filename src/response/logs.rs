//! Application log ring buffer
//!
//! Programs report progress through a `logmessage` field in their response.
//! The adapter keeps the most recent [`LOG_CAPACITY`] of them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

pub const LOG_CAPACITY: usize = 100;

/// One application log message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub message: String,
    pub time: DateTime<Utc>,
}

/// Bounded FIFO of log entries; the oldest entry is dropped on overflow
#[derive(Debug, Clone)]
pub struct LogRingBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl LogRingBuffer {
    pub fn new() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        LogRingBuffer {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, message: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            message: message.into(),
            time: Utc::now(),
        });
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.message.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for LogRingBuffer {
    fn default() -> Self {
        Self::new()
    }
}
