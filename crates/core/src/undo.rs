//! Bounded undo history of session snapshots.

use crate::model::SessionState;
use std::collections::VecDeque;

/// Stack of pre-mutation snapshots. When full, pushing drops the oldest snapshot.
///
/// Snapshots are cheap: a [`SessionState`] shares its group nodes with the live tree.
#[derive(Debug, Clone)]
pub struct UndoStack {
    entries: VecDeque<SessionState>,
    capacity: usize,
}

impl UndoStack {
    /// Creates an empty stack. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, snapshot: SessionState) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    /// Pops the most recent snapshot, or `None` if there is nothing to undo.
    pub fn pop(&mut self) -> Option<SessionState> {
        self.entries.pop_back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_UNDO_CAPACITY)
    }
}
