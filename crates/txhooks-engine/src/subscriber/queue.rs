//! Per-subscriber FIFO buffer of pending items.

use std::collections::VecDeque;

/// Ordered buffer of items pushed while a subscriber is in queued mode.
///
/// Only the owning subscriber touches its queue; draining hands the whole
/// content over at once and leaves the queue empty.
#[derive(Debug)]
pub struct WorkQueue<T> {
    items: VecDeque<T>,
}

impl<T> WorkQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    /// Appends an item at the back.
    pub fn push(&mut self, item: T) {
        self.items.push_back(item);
    }

    /// Takes every pending item in FIFO order, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<T> {
        std::mem::take(&mut self.items).into()
    }

    /// Drops every pending item and returns how many were discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.items.len();
        self.items.clear();
        discarded
    }

    /// Number of pending items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
