//! NNUE evaluation using a HalfKP `(41024 -> 256)x2 -> 32 -> 32 -> 1` network.
//!
//! [`NnueEvaluator`] keeps one accumulator per perspective and patches it
//! with the feature deltas of each move. A perspective whose king moved, or
//! whose pending delta lists grew past [`MAX_PENDING`], is marked dirty and
//! rebuilt from the board instead.

mod accumulator;
mod features;
mod loader;
mod network;
pub mod simd;

use std::sync::Arc;

use whale_core::{ALL_SQUARES, Board, Move, Piece};

pub use accumulator::Accumulator;
pub use features::{NUM_FEATURES, PS_END, active_features, append_changed_indices, feature_index, orient};
pub use loader::{NetworkHeader, load, read_from};
pub use network::{FeatureTransformer, HIDDEN, LAYER_SIZE, LOG2_WEIGHT_SCALE, LinearLayer, Network, OUTPUT_SCALE};

/// Pending deltas per perspective above which a refresh is cheaper.
pub const MAX_PENDING: usize = 30;

/// Incrementally updated NNUE state for one search thread.
#[derive(Debug, Clone)]
pub struct NnueEvaluator {
    net: Arc<Network>,
    accumulators: [Accumulator; 2],
    added: [Vec<usize>; 2],
    removed: [Vec<usize>; 2],
    dirty: [bool; 2],
}

impl NnueEvaluator {
    /// Both perspectives start dirty; the first update builds them.
    pub fn new(net: Arc<Network>) -> Self {
        Self {
            net,
            accumulators: [Accumulator::zeroed(), Accumulator::zeroed()],
            added: [Vec::with_capacity(MAX_PENDING + 4), Vec::with_capacity(MAX_PENDING + 4)],
            removed: [Vec::with_capacity(MAX_PENDING + 4), Vec::with_capacity(MAX_PENDING + 4)],
            dirty: [true, true],
        }
    }

    pub fn network(&self) -> &Arc<Network> {
        &self.net
    }

    pub fn accumulator(&self, perspective: usize) -> &Accumulator {
        &self.accumulators[perspective]
    }

    pub fn is_dirty(&self, perspective: usize) -> bool {
        self.dirty[perspective]
    }

    /// Rebuild `perspective` from `board` and drop its pending deltas.
    pub fn set_accumulator_from_board(&mut self, board: &Board, perspective: usize) {
        self.accumulators[perspective] = Accumulator::refresh(board, perspective, &self.net);
        self.added[perspective].clear();
        self.removed[perspective].clear();
        self.dirty[perspective] = false;
    }

    /// Queue the feature changes of `mv`, given the board before the move.
    ///
    /// With `is_undo` the move is being taken back, so its added features
    /// are queued as removals and vice versa.
    pub fn update_appended_features(&mut self, mv: Move, before: &Board, is_undo: bool) {
        let mover = before.side_to_move().to_index();
        let king_move = before.piece_on(ALL_SQUARES[mv.start_index()]) == Some(Piece::King);

        for perspective in 0..2 {
            if self.dirty[perspective] {
                continue;
            }
            if (perspective == mover && king_move)
                || self.added[perspective].len() > MAX_PENDING
                || self.removed[perspective].len() > MAX_PENDING
            {
                self.dirty[perspective] = true;
                self.added[perspective].clear();
                self.removed[perspective].clear();
                continue;
            }

            let (added, removed) = if is_undo {
                (&mut self.removed[perspective], &mut self.added[perspective])
            } else {
                (&mut self.added[perspective], &mut self.removed[perspective])
            };
            append_changed_indices(added, removed, mv, before, perspective);
        }
    }

    /// Bring both accumulators in line with `board`: dirty (or forced)
    /// perspectives are rebuilt, the others get their queued deltas.
    pub fn try_update_accumulators(&mut self, board: &Board, force_refresh: bool) {
        for perspective in 0..2 {
            if force_refresh || self.dirty[perspective] {
                self.set_accumulator_from_board(board, perspective);
                continue;
            }
            let acc = &mut self.accumulators[perspective];
            for &idx in &self.removed[perspective] {
                acc.remove_feature(idx, &self.net);
            }
            for &idx in &self.added[perspective] {
                acc.add_feature(idx, &self.net);
            }
            self.added[perspective].clear();
            self.removed[perspective].clear();
        }
    }

    /// Network output in centipawns for `side_to_move` (0 = white).
    ///
    /// The accumulators must be up to date.
    pub fn evaluate(&self, side_to_move: usize) -> i32 {
        self.net.evaluate(
            &self.accumulators[side_to_move],
            &self.accumulators[side_to_move ^ 1],
        )
    }
}

#[cfg(test)]
mod tests {
    use whale_core::Position;

    use super::*;

    fn patterned_network() -> Arc<Network> {
        let weights = (0..NUM_FEATURES * HIDDEN)
            .map(|i| ((i * 31) % 17) as i16 - 8)
            .collect();
        let transformer = FeatureTransformer::new(vec![3; HIDDEN], weights).unwrap();
        let hidden1 = LinearLayer::new(
            2 * HIDDEN,
            LAYER_SIZE,
            vec![0; LAYER_SIZE],
            (0..2 * HIDDEN * LAYER_SIZE).map(|i| (i % 5) as i8 - 2).collect(),
        )
        .unwrap();
        let hidden2 = LinearLayer::new(
            LAYER_SIZE,
            LAYER_SIZE,
            vec![0; LAYER_SIZE],
            (0..LAYER_SIZE * LAYER_SIZE).map(|i| (i % 3) as i8 - 1).collect(),
        )
        .unwrap();
        let output = LinearLayer::new(LAYER_SIZE, 1, vec![0], vec![4; LAYER_SIZE]).unwrap();
        Arc::new(Network::new(transformer, hidden1, hidden2, output).unwrap())
    }

    #[test]
    fn king_move_dirties_only_the_mover() {
        let mut pos = Position::from_fen("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1").unwrap();
        let mut nnue = NnueEvaluator::new(patterned_network());
        nnue.try_update_accumulators(pos.board(), true);

        let mv = pos.parse_uci_move("e1d1").unwrap();
        nnue.update_appended_features(mv, pos.board(), false);
        pos.make_move(mv);
        assert!(nnue.is_dirty(0));
        assert!(!nnue.is_dirty(1));

        nnue.try_update_accumulators(pos.board(), false);
        let fresh = Accumulator::refresh(pos.board(), 1, nnue.network());
        assert_eq!(nnue.accumulator(1), &fresh);
    }

    #[test]
    fn make_then_undo_restores_accumulators() {
        let mut pos = Position::startpos();
        let mut nnue = NnueEvaluator::new(patterned_network());
        nnue.try_update_accumulators(pos.board(), true);
        let before = nnue.evaluate(0);

        let mv = pos.parse_uci_move("e2e4").unwrap();
        nnue.update_appended_features(mv, pos.board(), false);
        pos.make_move(mv);
        pos.unmake_move();
        nnue.update_appended_features(mv, pos.board(), true);
        nnue.try_update_accumulators(pos.board(), false);

        assert!(!nnue.is_dirty(0) && !nnue.is_dirty(1));
        assert_eq!(nnue.evaluate(0), before);
    }

    #[test]
    fn long_pending_lists_force_a_refresh() {
        let mut pos = Position::startpos();
        let mut nnue = NnueEvaluator::new(patterned_network());
        nnue.try_update_accumulators(pos.board(), true);

        let knight_tour = ["g1f3", "g8f6", "f3g1", "f6g8"];
        for uci in knight_tour.iter().cycle().take(40) {
            let mv = pos.parse_uci_move(uci).unwrap();
            nnue.update_appended_features(mv, pos.board(), false);
            pos.make_move(mv);
        }
        assert!(nnue.is_dirty(0));
        nnue.try_update_accumulators(pos.board(), false);
        assert_eq!(nnue.accumulator(0), &Accumulator::refresh(pos.board(), 0, nnue.network()));
    }
}
