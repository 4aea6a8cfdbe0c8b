//! Local mirror of the authoritative farm state
//!
//! Only full snapshots replace grid content. Incremental events update the
//! known gold total for delta computation and nothing else, so the rendered
//! grid can trail an `event` by one snapshot.

use cyberfarm_protocol::{Cell, FarmState};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("snapshot has {got} rows, expected {expected}")]
    RowCount { expected: usize, got: usize },

    #[error("snapshot row {row} has {got} cells, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        got: usize,
    },
}

/// Holds the last applied snapshot
#[derive(Debug, Clone)]
pub struct FarmStateCache {
    grid_size: usize,
    state: FarmState,
}

impl FarmStateCache {
    /// Empty cache for a `grid_size × grid_size` farm
    pub fn new(grid_size: usize) -> Self {
        Self {
            grid_size,
            state: FarmState::default(),
        }
    }

    /// Replace the whole cached state
    ///
    /// A snapshot with an empty grid is accepted (resource totals only); any
    /// other grid must be exactly `grid_size × grid_size`. On error the
    /// previous state is kept.
    pub fn apply_snapshot(&mut self, snapshot: FarmState) -> Result<(), SnapshotError> {
        if !snapshot.grid.is_empty() {
            self.check_dimensions(&snapshot)?;
        }
        self.state = snapshot;
        Ok(())
    }

    fn check_dimensions(&self, snapshot: &FarmState) -> Result<(), SnapshotError> {
        let expected = self.grid_size;
        if snapshot.grid.len() != expected {
            return Err(SnapshotError::RowCount {
                expected,
                got: snapshot.grid.len(),
            });
        }
        if let Some((row, cells)) = snapshot
            .grid
            .iter()
            .enumerate()
            .find(|(_, cells)| cells.len() != expected)
        {
            return Err(SnapshotError::RowWidth {
                row,
                expected,
                got: cells.len(),
            });
        }
        Ok(())
    }

    pub const fn current_gold(&self) -> Option<i64> {
        self.state.gold
    }

    pub const fn current_time(&self) -> Option<f64> {
        self.state.time
    }

    /// Cell at column `x`, row `y`; `None` for empty positions
    pub fn current_cell(&self, x: usize, y: usize) -> Option<&Cell> {
        self.state.cell(x, y)
    }

    /// Record the gold total reported by an incremental event
    ///
    /// Returns the signed change against the previously known total, or
    /// `None` when no total was known yet.
    pub fn record_gold(&mut self, gold: i64) -> Option<i64> {
        let delta = self.state.gold.map(|known| gold - known);
        self.state.gold = Some(gold);
        delta
    }

    pub const fn grid_size(&self) -> usize {
        self.grid_size
    }

    pub fn has_grid(&self) -> bool {
        !self.state.grid.is_empty()
    }
}
