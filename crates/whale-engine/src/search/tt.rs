//! Lockless transposition table with XOR-verified entries.
//!
//! Three atomic words per entry (24 bytes).
//!
//! ## Bit layout
//!
//! ```text
//! data (AtomicU64):
//!   bit  63:    occupied
//!   bits 57-56: bound   (Exact=0, LowerBound=1, UpperBound=2)
//!   bits 55-48: depth   (8 bits)
//!   bits 47-32: move    (16 bits)
//!   bits 31-0:  value   (i32 bit pattern, mate scores ply-relative)
//!
//! check (AtomicU64): key XOR data
//!
//! generation (AtomicU32): search age of the last store, not verified
//! ```
//!
//! ## Torn-write detection
//!
//! On lookup: `check ^ data` must equal the probed key. Another thread
//! writing the same slot between our two loads, or a different position
//! mapping to the same index, both fail this test and read as a miss.
//!
//! All atomic accesses use `Relaxed` ordering.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use whale_core::Move;

use super::negamax::is_mate_score;

const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn check() {
        assert_send_sync::<TranspositionTable>();
    }
    let _ = check;
};

/// Smallest table size accepted, in megabytes.
pub const MIN_HASH_MB: usize = 16;

/// Largest table size accepted, in megabytes.
pub const MAX_HASH_MB: usize = 32_000;

/// Default table size, in megabytes.
pub const DEFAULT_HASH_MB: usize = 64;

/// Set in every stored data word, so an all-zero entry is never a hit.
const OCCUPIED: u64 = 1 << 63;

/// Bound type stored in a TT entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Bound {
    /// The stored score is exact.
    Exact = 0,
    /// The stored score is a lower bound (failed high).
    LowerBound = 1,
    /// The stored score is an upper bound (failed low).
    UpperBound = 2,
}

impl Bound {
    const fn from_bits(bits: u8) -> Self {
        match bits {
            1 => Bound::LowerBound,
            2 => Bound::UpperBound,
            _ => Bound::Exact,
        }
    }
}

/// Convert a root-relative mate score to one relative to the node at `ply`.
pub fn score_to_tt(score: i32, ply: i32) -> i32 {
    if is_mate_score(score) {
        let sign = score.signum();
        (score * sign + ply) * sign
    } else {
        score
    }
}

/// Reverse [`score_to_tt`] for a node at `ply`.
pub fn score_from_tt(score: i32, ply: i32) -> i32 {
    if is_mate_score(score) {
        let sign = score.signum();
        (score * sign - ply) * sign
    } else {
        score
    }
}

/// A verified entry, decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtEntry {
    /// Value as stored (ply-relative for mates).
    pub value: i32,
    pub best_move: Move,
    pub depth: u8,
    pub bound: Bound,
}

impl TtEntry {
    fn pack(self) -> u64 {
        (self.value as u32 as u64)
            | ((self.best_move.raw() as u64) << 32)
            | ((self.depth as u64) << 48)
            | ((self.bound as u8 as u64) << 56)
            | OCCUPIED
    }

    fn unpack(data: u64) -> TtEntry {
        TtEntry {
            value: data as u32 as i32,
            best_move: Move::from_raw((data >> 32) as u16),
            depth: (data >> 48) as u8,
            bound: Bound::from_bits((data >> 56) as u8 & 0b11),
        }
    }
}

struct AtomicEntry {
    check: AtomicU64,
    data: AtomicU64,
    generation: AtomicU32,
}

impl AtomicEntry {
    const fn new() -> Self {
        Self {
            check: AtomicU64::new(0),
            data: AtomicU64::new(0),
            generation: AtomicU32::new(0),
        }
    }

    fn load(&self, key: u64) -> Option<TtEntry> {
        let check = self.check.load(Ordering::Relaxed);
        let data = self.data.load(Ordering::Relaxed);
        if data & OCCUPIED == 0 || check ^ data != key {
            return None;
        }
        Some(TtEntry::unpack(data))
    }

    fn store(&self, key: u64, data: u64, generation: u32) {
        self.data.store(data, Ordering::Relaxed);
        self.check.store(key ^ data, Ordering::Relaxed);
        self.generation.store(generation, Ordering::Relaxed);
    }

    fn reset(&self) {
        self.check.store(0, Ordering::Relaxed);
        self.data.store(0, Ordering::Relaxed);
        self.generation.store(0, Ordering::Relaxed);
    }
}

/// Lockless transposition table shared by every search thread.
///
/// All probing and storing methods take `&self`. Resizing takes `&mut self`,
/// which cannot happen while workers hold a shared borrow.
pub struct TranspositionTable {
    entries: Box<[AtomicEntry]>,
    size_mb: usize,
    age: AtomicU32,
}

impl TranspositionTable {
    /// Create a table of `mb` megabytes, clamped to the supported range.
    pub fn new(mb: usize) -> Self {
        let size_mb = mb.clamp(MIN_HASH_MB, MAX_HASH_MB);
        Self {
            entries: allocate(size_mb),
            size_mb,
            age: AtomicU32::new(0),
        }
    }

    /// A table of exactly `count` entries, for tests that want collisions.
    #[cfg(test)]
    fn with_entries(count: usize) -> Self {
        Self {
            entries: (0..count.max(1)).map(|_| AtomicEntry::new()).collect(),
            size_mb: 0,
            age: AtomicU32::new(0),
        }
    }

    /// Reallocate with a new size. All entries are lost.
    pub fn resize(&mut self, mb: usize) {
        let size_mb = mb.clamp(MIN_HASH_MB, MAX_HASH_MB);
        if size_mb != self.size_mb {
            self.entries = allocate(size_mb);
            self.size_mb = size_mb;
        }
        self.clear();
    }

    /// Clear all entries and reset the age.
    pub fn clear(&self) {
        for entry in self.entries.iter() {
            entry.reset();
        }
        self.age.store(0, Ordering::Relaxed);
    }

    pub fn size_mb(&self) -> usize {
        self.size_mb
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Current search generation.
    pub fn generation(&self) -> u32 {
        self.age.load(Ordering::Relaxed)
    }

    /// Advance the generation. Called once per completed main-thread iteration.
    pub fn advance_age(&self) {
        self.age.fetch_add(1, Ordering::Relaxed);
    }

    fn index(&self, key: u64) -> usize {
        (key % self.entries.len() as u64) as usize
    }

    /// Verified entry for `key`, if present.
    pub fn probe(&self, key: u64) -> Option<TtEntry> {
        self.entries[self.index(key)].load(key)
    }

    /// Usable value for a node at `ply` searched to `depth` with window
    /// `[alpha, beta]`, or `None` when the entry is missing, too shallow,
    /// or its bound does not decide the window.
    pub fn lookup(&self, key: u64, depth: i32, ply: i32, alpha: i32, beta: i32) -> Option<i32> {
        let entry = self.probe(key)?;
        if (entry.depth as i32) < depth {
            return None;
        }
        let value = score_from_tt(entry.value, ply);
        match entry.bound {
            Bound::Exact => Some(value),
            Bound::UpperBound if value <= alpha => Some(value),
            Bound::LowerBound if value >= beta => Some(value),
            _ => None,
        }
    }

    /// Stored best move for `key`, or [`Move::NULL`].
    pub fn stored_move(&self, key: u64) -> Move {
        self.probe(key).map_or(Move::NULL, |entry| entry.best_move)
    }

    /// Store a search result.
    ///
    /// The slot is only overwritten when `depth` is at least the stored
    /// depth or `generation` is newer than the stored generation.
    pub fn store(
        &self,
        key: u64,
        depth: i32,
        ply: i32,
        value: i32,
        bound: Bound,
        best_move: Move,
        generation: u32,
    ) {
        let entry = &self.entries[self.index(key)];
        let depth = depth.clamp(0, u8::MAX as i32) as u8;

        let existing = entry.data.load(Ordering::Relaxed);
        let existing_depth = (existing >> 48) as u8;
        let existing_generation = entry.generation.load(Ordering::Relaxed);
        if existing & OCCUPIED != 0 && depth < existing_depth && generation <= existing_generation {
            return;
        }

        let data = TtEntry {
            value: score_to_tt(value, ply),
            best_move,
            depth,
            bound,
        }
        .pack();
        entry.store(key, data, generation);
    }

    /// Permille of sampled slots that hold an entry.
    pub fn occupancy_permille(&self) -> usize {
        let sample = self.entries.len().min(1000);
        let used = self.entries[..sample]
            .iter()
            .filter(|entry| entry.data.load(Ordering::Relaxed) & OCCUPIED != 0)
            .count();
        used * 1000 / sample.max(1)
    }
}

fn allocate(mb: usize) -> Box<[AtomicEntry]> {
    let count = (mb * 1024 * 1024 / std::mem::size_of::<AtomicEntry>()).max(1);
    (0..count).map(|_| AtomicEntry::new()).collect()
}

impl std::fmt::Debug for TranspositionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranspositionTable")
            .field("entries", &self.entries.len())
            .field("size_mb", &self.size_mb)
            .field("age", &self.generation())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use whale_core::MoveFlag;
    use crate::search::negamax::IMMEDIATE_MATE_SCORE;

    fn e2e4() -> Move {
        Move::new(12, 28, MoveFlag::PawnTwoUp)
    }

    fn d2d4() -> Move {
        Move::new(11, 27, MoveFlag::PawnTwoUp)
    }

    #[test]
    fn atomic_entry_is_24_bytes() {
        assert_eq!(std::mem::size_of::<AtomicEntry>(), 24);
    }

    #[test]
    fn size_is_clamped() {
        assert_eq!(TranspositionTable::new(1).size_mb(), MIN_HASH_MB);
        let tt = TranspositionTable::new(MIN_HASH_MB);
        assert_eq!(tt.entry_count(), MIN_HASH_MB * 1024 * 1024 / 24);
    }

    #[test]
    fn store_and_probe_roundtrip() {
        let tt = TranspositionTable::with_entries(1024);
        let key = 0xDEAD_BEEF_1234_5678;
        tt.store(key, 5, 0, -100, Bound::Exact, e2e4(), 0);

        let entry = tt.probe(key).expect("should find stored entry");
        assert_eq!(entry.best_move, e2e4());
        assert_eq!(entry.depth, 5);
        assert_eq!(entry.bound, Bound::Exact);
        assert_eq!(entry.value, -100);
        assert_eq!(tt.stored_move(key), e2e4());
    }

    #[test]
    fn all_zero_result_is_still_a_hit() {
        let tt = TranspositionTable::with_entries(1024);
        let key = 0x0BAD_CAFE;
        assert!(tt.probe(key).is_none());
        tt.store(key, 0, 0, 0, Bound::Exact, Move::NULL, 0);

        let entry = tt.probe(key).expect("exact depth 0 entry should be found");
        assert_eq!(entry.value, 0);
        assert_eq!(entry.depth, 0);
        assert_eq!(entry.bound, Bound::Exact);
        assert_eq!(tt.lookup(key, 0, 0, -10, 10), Some(0));
        assert_eq!(tt.occupancy_permille(), 1);
    }

    #[test]
    fn probe_miss_returns_none() {
        let tt = TranspositionTable::with_entries(1024);
        assert!(tt.probe(0x1234_5678_9ABC_DEF0).is_none());
        assert_eq!(tt.stored_move(0x1234_5678_9ABC_DEF0), Move::NULL);
    }

    #[test]
    fn colliding_key_is_a_miss() {
        let tt = TranspositionTable::with_entries(16);
        tt.store(3, 4, 0, 50, Bound::Exact, e2e4(), 0);
        assert!(tt.probe(3 + 16).is_none());
    }

    #[test]
    fn lookup_respects_depth_and_bounds() {
        let tt = TranspositionTable::with_entries(1024);
        let key = 77;
        tt.store(key, 6, 0, 40, Bound::Exact, e2e4(), 0);
        assert_eq!(tt.lookup(key, 6, 0, -10, 10), Some(40));
        assert_eq!(tt.lookup(key, 7, 0, -10, 10), None);

        let key = 78;
        tt.store(key, 6, 0, 40, Bound::LowerBound, e2e4(), 0);
        assert_eq!(tt.lookup(key, 4, 0, 0, 30), Some(40));
        assert_eq!(tt.lookup(key, 4, 0, 0, 50), None);

        let key = 79;
        tt.store(key, 6, 0, -40, Bound::UpperBound, e2e4(), 0);
        assert_eq!(tt.lookup(key, 4, 0, -30, 0), Some(-40));
        assert_eq!(tt.lookup(key, 4, 0, -50, 0), None);
    }

    #[test]
    fn mate_score_adjustment_roundtrip() {
        let mate_in_3 = IMMEDIATE_MATE_SCORE - 3;
        for ply in [0, 5, 40] {
            assert_eq!(score_from_tt(score_to_tt(mate_in_3, ply), ply), mate_in_3);
            assert_eq!(score_from_tt(score_to_tt(-mate_in_3, ply), ply), -mate_in_3);
        }
    }

    #[test]
    fn mate_score_is_stored_relative_to_node() {
        let tt = TranspositionTable::with_entries(1024);
        let key = 42;
        // Mate found 7 plies from root at a node 5 plies deep: mate in 2 from the node.
        tt.store(key, 3, 5, IMMEDIATE_MATE_SCORE - 7, Bound::Exact, e2e4(), 0);
        assert_eq!(tt.probe(key).unwrap().value, IMMEDIATE_MATE_SCORE - 2);
        // Reached again at ply 9: now mate 11 plies from root.
        assert_eq!(tt.lookup(key, 3, 9, -1, 1), Some(IMMEDIATE_MATE_SCORE - 11));
    }

    #[test]
    fn normal_score_not_adjusted() {
        assert_eq!(score_to_tt(150, 10), 150);
        assert_eq!(score_from_tt(-150, 10), -150);
    }

    #[test]
    fn shallower_store_same_generation_is_ignored() {
        let tt = TranspositionTable::with_entries(1024);
        let key = 0x1111_2222_3333_4444;
        tt.store(key, 5, 0, 100, Bound::LowerBound, e2e4(), 3);
        tt.store(key, 3, 0, 200, Bound::LowerBound, d2d4(), 3);
        tt.store(key, 3, 0, 300, Bound::LowerBound, d2d4(), 2);

        let entry = tt.probe(key).unwrap();
        assert_eq!(entry.best_move, e2e4());
        assert_eq!(entry.value, 100);
    }

    #[test]
    fn newer_generation_replaces_deeper_entry() {
        let tt = TranspositionTable::with_entries(1024);
        let key = 0xAAAA_BBBB_CCCC_DDDD;
        tt.store(key, 10, 0, 100, Bound::Exact, e2e4(), 0);
        tt.advance_age();
        tt.store(key, 1, 0, 200, Bound::LowerBound, d2d4(), tt.generation());

        let entry = tt.probe(key).unwrap();
        assert_eq!(entry.best_move, d2d4());
        assert_eq!(entry.value, 200);
    }

    #[test]
    fn equal_depth_replaces() {
        let tt = TranspositionTable::with_entries(1024);
        let key = 5;
        tt.store(key, 4, 0, 1, Bound::Exact, e2e4(), 0);
        tt.store(key, 4, 0, 2, Bound::Exact, d2d4(), 0);
        assert_eq!(tt.probe(key).unwrap().value, 2);
    }

    #[test]
    fn clear_removes_all_entries_and_age() {
        let tt = TranspositionTable::with_entries(1024);
        let key = 0xAAAA_BBBB_CCCC_DDDD;
        tt.advance_age();
        tt.store(key, 5, 0, 100, Bound::Exact, e2e4(), 1);
        assert!(tt.probe(key).is_some());

        tt.clear();
        assert!(tt.probe(key).is_none());
        assert_eq!(tt.generation(), 0);
    }

    #[test]
    fn xor_integrity_detects_torn_write() {
        let tt = TranspositionTable::with_entries(1024);
        let key = 0xDEAD_BEEF_1234_5678;
        tt.store(key, 5, 0, 100, Bound::Exact, e2e4(), 0);
        assert!(tt.probe(key).is_some(), "entry should be found before corruption");

        // Replace the data word as if another thread's write landed halfway.
        let entry = &tt.entries[tt.index(key)];
        let other = TtEntry {
            value: 7,
            best_move: d2d4(),
            depth: 9,
            bound: Bound::LowerBound,
        }
        .pack();
        entry.data.store(other, Ordering::Relaxed);

        assert!(tt.probe(key).is_none(), "probe should miss after a torn write");
    }

    #[test]
    fn concurrent_stress_no_panics() {
        use std::thread;

        let tt = TranspositionTable::with_entries(4096);

        thread::scope(|s| {
            for t in 0..8u64 {
                let tt = &tt;
                s.spawn(move || {
                    for i in 0u64..10_000 {
                        let key = (t.wrapping_mul(6364136223846793005))
                            .wrapping_add(i.wrapping_mul(2862933555777941757))
                            ^ 0xDEAD_BEEF_CAFE_F00D;
                        tt.store(key, 5, 0, 100, Bound::Exact, e2e4(), 0);
                        if let Some(entry) = tt.probe(key) {
                            assert_eq!(entry.value, 100);
                        }
                    }
                });
            }
        });
    }
}
