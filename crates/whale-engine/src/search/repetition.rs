//! Per-thread repetition detection.

/// Stack of position keys along the current line.
///
/// Each key remembers where its reversible run begins, so a lookup only
/// scans positions that could still repeat: a capture or pawn move starts
/// a new run.
#[derive(Debug, Clone, Default)]
pub struct RepetitionTable {
    keys: Vec<u64>,
    /// `run_starts[i]` is the start of the run the key at `i - 1` belongs
    /// to; `run_starts[keys.len()]` is the run a lookup scans.
    run_starts: Vec<usize>,
}

impl RepetitionTable {
    pub fn new() -> Self {
        Self {
            keys: Vec::with_capacity(512),
            run_starts: vec![0],
        }
    }

    /// Load the game history since the last irreversible move, oldest
    /// first, ending with the current position.
    pub fn init(&mut self, history: &[u64]) {
        self.keys.clear();
        self.run_starts.clear();
        self.run_starts.push(0);
        for &key in history {
            self.keys.push(key);
            self.run_starts.push(0);
        }
    }

    /// Record `key` as the newest position. `reset` starts a new run when
    /// the move into this position cannot be undone.
    pub fn push(&mut self, key: u64, reset: bool) {
        let start = if reset {
            self.keys.len()
        } else {
            self.run_starts[self.keys.len()]
        };
        self.keys.push(key);
        self.run_starts.push(start);
    }

    /// Drop the newest key, if any.
    pub fn try_pop(&mut self) {
        if self.keys.pop().is_some() {
            self.run_starts.pop();
        }
    }

    /// Whether `key` occurs in the current reversible run.
    pub fn contains(&self, key: u64) -> bool {
        let start = self.run_starts[self.keys.len()];
        self.keys[start..].contains(&key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
