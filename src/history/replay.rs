use std::collections::VecDeque;

use crate::message::Message;

/// Bounded ring of the most recent messages for one room.
///
/// Always reflects the last `capacity` messages as observed by the owning
/// bridge; the oldest entry is evicted on overflow. Snapshots are ascending
/// by sequence number and never touch durable-log I/O.
#[derive(Debug)]
pub struct ReplayBuffer {
    capacity: usize,
    entries: VecDeque<Message>,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, message: Message) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(message);
    }

    /// Current contents, oldest first.
    pub fn snapshot(&self) -> Vec<Message> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
