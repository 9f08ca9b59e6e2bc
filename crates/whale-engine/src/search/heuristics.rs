//! Killer move table and history heuristic for quiet move ordering.

use whale_core::Move;

use crate::search::negamax::MAX_PLY;

/// Two killer moves per ply: quiet moves that caused beta cutoffs.
pub struct KillerTable {
    slots: Box<[[Move; 2]; MAX_PLY]>,
}

impl KillerTable {
    /// Create an empty killer table.
    pub fn new() -> Self {
        Self {
            slots: Box::new([[Move::NULL; 2]; MAX_PLY]),
        }
    }

    /// Store a killer move at the given ply.
    ///
    /// Shifts slot 0 to slot 1 if the new move differs from slot 0.
    pub fn store(&mut self, ply: usize, mv: Move) {
        if ply >= MAX_PLY {
            return;
        }
        if self.slots[ply][0] != mv {
            self.slots[ply][1] = self.slots[ply][0];
            self.slots[ply][0] = mv;
        }
    }

    /// Check if a move is a killer at the given ply.
    pub fn is_killer(&self, ply: usize, mv: Move) -> bool {
        if ply >= MAX_PLY || mv.is_null() {
            return false;
        }
        self.slots[ply][0] == mv || self.slots[ply][1] == mv
    }

    pub fn clear(&mut self) {
        self.slots.fill([Move::NULL; 2]);
    }
}

impl Default for KillerTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Ceiling of a history score. Keeps quiet moves below the killer and
/// losing-capture ordering bands.
pub const HISTORY_MAX: i32 = 1_000_000;

/// History heuristic table, indexed by `[colour][from][to]`.
///
/// Accumulates `depth²` for quiet moves that cause beta cutoffs, up to
/// [`HISTORY_MAX`].
pub struct HistoryTable {
    table: Box<[[[i32; 64]; 64]; 2]>,
}

impl HistoryTable {
    /// Create a zeroed history table.
    pub fn new() -> Self {
        Self {
            table: Box::new([[[0; 64]; 64]; 2]),
        }
    }

    /// Reward a quiet move by `colour` that caused a beta cutoff.
    pub fn reward(&mut self, colour: usize, mv: Move, depth: i32) {
        let entry = &mut self.table[colour][mv.start_index()][mv.target_index()];
        *entry = entry.saturating_add(depth.saturating_mul(depth)).min(HISTORY_MAX);
    }

    /// History score for a quiet move by `colour`.
    pub fn score(&self, colour: usize, mv: Move) -> i32 {
        self.table[colour][mv.start_index()][mv.target_index()]
    }

    pub fn clear(&mut self) {
        for colour in self.table.iter_mut() {
            for row in colour.iter_mut() {
                row.fill(0);
            }
        }
    }
}

impl Default for HistoryTable {
    fn default() -> Self {
        Self::new()
    }
}
