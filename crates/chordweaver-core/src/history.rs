//! Bounded undo/redo over progression snapshots

use std::collections::VecDeque;

use crate::progression::Progression;

pub const DEFAULT_HISTORY_CAPACITY: usize = 64;

/// Linear undo history of immutable progression snapshots.
pub struct History {
    undo: VecDeque<Progression>,
    redo: Vec<Progression>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Save the state before an edit. Drops the oldest snapshot when full.
    pub fn record(&mut self, before: &Progression) {
        self.redo.clear();
        self.undo.push_back(before.clone());
        while self.undo.len() > self.capacity {
            self.undo.pop_front();
        }
    }

    /// Step back: returns the snapshot to restore, or None at the bottom.
    pub fn undo(&mut self, current: &Progression) -> Option<Progression> {
        let snapshot = self.undo.pop_back()?;
        self.redo.push(current.clone());
        Some(snapshot)
    }

    /// Step forward again after an undo.
    pub fn redo(&mut self, current: &Progression) -> Option<Progression> {
        let snapshot = self.redo.pop()?;
        self.undo.push_back(current.clone());
        Some(snapshot)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn len(&self) -> usize {
        self.undo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_rests(count: usize) -> Progression {
        let mut p = Progression::new();
        for _ in 0..count {
            p.push_rest(1.0).unwrap();
        }
        p
    }

    #[test]
    fn test_undo_redo_single() {
        let mut history = History::default();
        let before = with_rests(1);
        let after = with_rests(2);
        history.record(&before);

        assert!(history.can_undo());
        let restored = history.undo(&after).unwrap();
        assert_eq!(restored, before);
        assert!(history.can_redo());
        assert_eq!(history.redo(&restored).unwrap(), after);
    }

    #[test]
    fn test_undo_at_bottom_returns_none() {
        let mut history = History::default();
        assert!(history.undo(&Progression::new()).is_none());
        assert!(history.redo(&Progression::new()).is_none());
    }

    #[test]
    fn test_new_edit_after_undo_truncates_redo() {
        let mut history = History::default();
        history.record(&with_rests(0));
        history.record(&with_rests(1));
        history.undo(&with_rests(2));
        assert!(history.can_redo());

        history.record(&with_rests(1));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut history = History::new(3);
        for n in 0..5 {
            history.record(&with_rests(n));
        }
        assert_eq!(history.len(), 3);
        let mut current = with_rests(5);
        let mut lengths = Vec::new();
        while let Some(snapshot) = history.undo(&current) {
            lengths.push(snapshot.len());
            current = snapshot;
        }
        assert_eq!(lengths, [4, 3, 2]);
    }
}
