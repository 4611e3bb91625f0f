//! Snapshot history over serialized documents.

use std::collections::VecDeque;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryEntry {
    pub seq: u64,
    pub json: String,
}

/// Linear undo/redo over immutable snapshots. The entry under the cursor is
/// the state currently shown; entries after it are the redo branch.
#[derive(Debug)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    cursor: usize,
    capacity: usize,
    next_seq: u64,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: 0,
            capacity: capacity.max(1),
            next_seq: 0,
        }
    }

    /// Drops everything and records `json` as the only entry.
    pub fn reset(&mut self, json: String) {
        self.entries.clear();
        self.cursor = 0;
        self.push(json);
    }

    /// Appends a snapshot, discarding the redo branch. The oldest entry is
    /// evicted once capacity is reached.
    pub fn push(&mut self, json: String) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push_back(HistoryEntry { seq, json });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn undo(&mut self) -> Option<&HistoryEntry> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor)
    }

    pub fn redo(&mut self) -> Option<&HistoryEntry> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        self.entries.get(self.cursor)
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.cursor)
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undo_redo_walks_the_cursor() {
        let mut h = History::new(10);
        h.reset("a".into());
        h.push("b".into());
        h.push("c".into());
        assert_eq!(h.undo().map(|e| e.json.as_str()), Some("b"));
        assert_eq!(h.undo().map(|e| e.json.as_str()), Some("a"));
        assert!(h.undo().is_none());
        assert_eq!(h.redo().map(|e| e.json.as_str()), Some("b"));
    }

    #[test]
    fn push_after_undo_drops_redo_branch() {
        let mut h = History::new(10);
        h.reset("a".into());
        h.push("b".into());
        h.undo();
        h.push("c".into());
        assert!(!h.can_redo());
        assert_eq!(h.len(), 2);
        assert_eq!(h.current().map(|e| e.json.as_str()), Some("c"));
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut h = History::new(3);
        h.reset("0".into());
        for i in 1..6 {
            h.push(i.to_string());
        }
        assert_eq!(h.len(), 3);
        assert_eq!(h.undo().map(|e| e.json.as_str()), Some("4"));
        assert_eq!(h.undo().map(|e| e.json.as_str()), Some("3"));
        assert!(h.undo().is_none());
    }

    #[test]
    fn sequence_numbers_increase() {
        let mut h = History::new(2);
        h.reset("a".into());
        h.push("b".into());
        h.push("c".into());
        assert_eq!(h.current().map(|e| e.seq), Some(2));
    }
}
