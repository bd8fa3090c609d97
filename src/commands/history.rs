//! Undo history for canvas edits

use pixelsong_core::types::Grid;
use std::collections::VecDeque;

/// Snapshots kept before the oldest is dropped
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Grid snapshots with a cursor. Recording after an undo discards the redo
/// tail.
#[derive(Debug, Clone)]
pub struct History {
    snapshots: VecDeque<Grid>,
    step: usize,
    limit: usize,
}

impl History {
    pub fn new(initial: Grid, limit: usize) -> Self {
        let mut snapshots = VecDeque::with_capacity(limit.min(DEFAULT_HISTORY_LIMIT));
        snapshots.push_back(initial);
        Self {
            snapshots,
            step: 0,
            limit: limit.max(1),
        }
    }

    /// Record `grid` as the newest state. An unchanged grid is not recorded.
    pub fn record(&mut self, grid: &Grid) {
        if self.snapshots.get(self.step) == Some(grid) {
            return;
        }
        self.snapshots.truncate(self.step + 1);
        if self.snapshots.len() >= self.limit {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(grid.clone());
        self.step = self.snapshots.len() - 1;
    }

    pub fn undo(&mut self) -> Option<&Grid> {
        if self.step == 0 {
            return None;
        }
        self.step -= 1;
        self.snapshots.get(self.step)
    }

    pub fn redo(&mut self) -> Option<&Grid> {
        if self.step + 1 >= self.snapshots.len() {
            return None;
        }
        self.step += 1;
        self.snapshots.get(self.step)
    }

    pub fn can_undo(&self) -> bool {
        self.step > 0
    }

    pub fn can_redo(&self) -> bool {
        self.step + 1 < self.snapshots.len()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(Grid::default(), DEFAULT_HISTORY_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixelsong_core::types::Color;

    const RED: Color = Color::rgb(0xD2, 0x60, 0x64);

    fn painted(col: usize) -> Grid {
        Grid::blank(4).unwrap().with_cell(0, col, RED).unwrap()
    }

    #[test]
    fn test_undo_and_redo() {
        let mut history = History::new(Grid::blank(4).unwrap(), 10);
        history.record(&painted(0));
        history.record(&painted(1));

        assert_eq!(history.undo(), Some(&painted(0)));
        assert_eq!(history.undo(), Some(&Grid::blank(4).unwrap()));
        assert_eq!(history.undo(), None);
        assert_eq!(history.redo(), Some(&painted(0)));
        assert_eq!(history.redo(), Some(&painted(1)));
        assert_eq!(history.redo(), None);
    }

    #[test]
    fn test_new_edit_discards_redo() {
        let mut history = History::new(Grid::blank(4).unwrap(), 10);
        history.record(&painted(0));
        history.record(&painted(1));
        history.undo();

        history.record(&painted(2));
        assert!(!history.can_redo());
        assert_eq!(history.len(), 3);
        assert_eq!(history.undo(), Some(&painted(0)));
    }

    #[test]
    fn test_unchanged_grid_not_recorded() {
        let mut history = History::new(Grid::blank(4).unwrap(), 10);
        history.record(&Grid::blank(4).unwrap());
        assert!(!history.can_undo());
    }

    #[test]
    fn test_oldest_snapshot_dropped_at_limit() {
        let mut history = History::new(Grid::blank(4).unwrap(), 3);
        for col in 0..4 {
            history.record(&painted(col));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.undo(), Some(&painted(2)));
        assert_eq!(history.undo(), Some(&painted(1)));
        assert_eq!(history.undo(), None);
    }
}
