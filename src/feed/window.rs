//! Capped list of rendered records shown in the message log.

use std::collections::VecDeque;

use super::MAX_NUM_MESSAGES;

/// One entry of the message log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRecord {
    /// Assigned when the line is drained; strictly increasing, never reused.
    pub id: u64,
    pub text: String,
}

/// Ordered, capacity-bounded sequence of [`DisplayRecord`]s.
///
/// Ids continue from the highest id ever assigned, so evicting old records
/// never causes an id to be handed out twice. Two windows compare equal when
/// their records are equal, which is what the UI uses for change detection.
#[derive(Debug, Clone)]
pub struct DisplayWindow {
    records: VecDeque<DisplayRecord>,
    last_id: u64,
    capacity: usize,
}

impl PartialEq for DisplayWindow {
    fn eq(&self, other: &Self) -> bool {
        self.records == other.records
    }
}

impl Eq for DisplayWindow {}

impl Default for DisplayWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayWindow {
    pub fn new() -> Self {
        Self::with_capacity(MAX_NUM_MESSAGES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity + 1),
            last_id: 0,
            capacity,
        }
    }

    /// Appends drained lines in order and returns how many were appended.
    pub fn append_drained<I>(&mut self, lines: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut appended = 0;
        for text in lines {
            self.last_id += 1;
            self.records.push_back(DisplayRecord {
                id: self.last_id,
                text,
            });
            if self.records.len() > self.capacity {
                self.records.pop_front();
            }
            appended += 1;
        }
        appended
    }

    /// Snapshot of the records, oldest first.
    pub fn current_contents(&self) -> Vec<DisplayRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DisplayRecord> {
        self.records.iter()
    }

    /// Highest id assigned so far, 0 before the first append.
    pub fn last_id(&self) -> u64 {
        self.last_id
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
