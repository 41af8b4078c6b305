// Bounded undo/redo history for drawing surfaces.

mod canvas;

use std::collections::VecDeque;

pub use canvas::{CanvasSurface, DrawingSession, PixelCanvas, Rgba, Snapshot, MAX_BRUSH};

pub const DEFAULT_HISTORY_CAP: usize = 20;

/// Sequence of snapshots with a cursor at the one currently displayed.
///
/// Entries after the cursor are redo-able. The stack is never empty and
/// never longer than its cap; the oldest entries are evicted first.
#[derive(Debug, Clone)]
pub struct HistoryStack<T> {
    entries: VecDeque<T>,
    cursor: usize,
    cap: usize,
}

impl<T> HistoryStack<T> {
    pub fn new(initial: T) -> Self {
        Self::with_capacity(initial, DEFAULT_HISTORY_CAP)
    }

    /// A cap of zero is treated as one.
    pub fn with_capacity(initial: T, cap: usize) -> Self {
        let mut entries = VecDeque::with_capacity(cap.clamp(1, DEFAULT_HISTORY_CAP));
        entries.push_back(initial);
        Self {
            entries,
            cursor: 0,
            cap: cap.max(1),
        }
    }

    /// Drop all history and start over from `initial`.
    pub fn reset(&mut self, initial: T) {
        self.entries.clear();
        self.entries.push_back(initial);
        self.cursor = 0;
    }

    /// Record a finished action. Discards the redo tail.
    pub fn commit(&mut self, snapshot: T) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push_back(snapshot);
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
    }

    /// Step back. Returns the snapshot to display, or `None` at the oldest entry.
    pub fn undo(&mut self) -> Option<&T> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor)
    }

    /// Step forward. Returns the snapshot to display, or `None` at the newest entry.
    pub fn redo(&mut self) -> Option<&T> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        self.entries.get(self.cursor)
    }

    pub fn current(&self) -> &T {
        &self.entries[self.cursor]
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Never true: the stack always holds at least the base entry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }
}
