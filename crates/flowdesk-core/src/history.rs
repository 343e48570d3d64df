//! Bounded linear undo/redo history.
//!
//! [`HistoryManager`] is a pure sequence container: it stores forward entries
//! (never inverses) with a cursor pointing at the last applied one. Inverting
//! an entry needs entity snapshots only the caller has, so the history knows
//! nothing about patches beyond holding them.

use std::collections::VecDeque;

/// Default maximum number of entries kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// A linear undo/redo stack with branch truncation and a size cap.
#[derive(Debug, Clone)]
pub struct HistoryManager<T> {
    entries: VecDeque<T>,
    /// Number of entries at or below the cursor (cursor + 1).
    applied: usize,
    max_size: usize,
}

impl<T> HistoryManager<T> {
    /// Creates an empty history keeping at most `max_size` entries
    /// (clamped to at least one).
    pub fn new(max_size: usize) -> Self {
        HistoryManager {
            entries: VecDeque::new(),
            applied: 0,
            max_size: max_size.max(1),
        }
    }

    /// Records a new entry after the cursor.
    ///
    /// Entries that were undone are discarded first (a new edit after an
    /// undo starts a new branch). When the cap is exceeded the oldest entry
    /// is dropped and the cursor shifts down with it.
    pub fn execute(&mut self, entry: T) {
        self.entries.truncate(self.applied);
        self.entries.push_back(entry);
        self.applied += 1;
        if self.entries.len() > self.max_size {
            self.entries.pop_front();
            self.applied -= 1;
        }
    }

    /// Steps the cursor back, returning the entry to invert. `None` when
    /// nothing is left to undo.
    pub fn undo(&mut self) -> Option<&T> {
        if self.applied == 0 {
            return None;
        }
        self.applied -= 1;
        self.entries.get(self.applied)
    }

    /// Steps the cursor forward, returning the entry to re-apply. `None`
    /// when the cursor is already at the newest entry.
    pub fn redo(&mut self) -> Option<&T> {
        if self.applied == self.entries.len() {
            return None;
        }
        self.applied += 1;
        self.entries.get(self.applied - 1)
    }

    /// Undoes a cursor step taken by [`undo`](Self::undo) whose entry could
    /// not actually be reverted.
    pub fn cancel_undo(&mut self) {
        if self.applied < self.entries.len() {
            self.applied += 1;
        }
    }

    /// Undoes a cursor step taken by [`redo`](Self::redo) whose entry could
    /// not actually be re-applied.
    pub fn cancel_redo(&mut self) {
        if self.applied > 0 {
            self.applied -= 1;
        }
    }

    /// Peeks at the entry the next [`undo`](Self::undo) would return.
    pub fn peek_undo(&self) -> Option<&T> {
        self.applied.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    pub fn can_undo(&self) -> bool {
        self.applied > 0
    }

    pub fn can_redo(&self) -> bool {
        self.applied < self.entries.len()
    }

    /// Number of entries that can currently be undone.
    pub fn undo_depth(&self) -> usize {
        self.applied
    }

    /// Number of entries that can currently be redone.
    pub fn redo_depth(&self) -> usize {
        self.entries.len() - self.applied
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Resets to an empty stack.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.applied = 0;
    }

    /// Iterates entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}

impl<T> Default for HistoryManager<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}
