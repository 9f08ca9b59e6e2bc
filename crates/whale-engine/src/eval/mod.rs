//! Position evaluation.
//!
//! The classical evaluation sums material, piece-square tables, pawn
//! structure, king attack and mop-up terms per side. A per-thread
//! [`Evaluation`] optionally layers an NNUE network on top.

pub mod king_safety;
pub mod material;
pub mod mop_up;
pub mod nnue;
pub mod pawns;
pub mod pst;

use std::sync::Arc;

use whale_core::{Board, Color, Move, Position};

use self::king_safety::evaluate_king_attack;
use self::material::MaterialInfo;
use self::mop_up::mop_up;
use self::nnue::{Network, NnueEvaluator};
use self::pawns::evaluate_pawns;
use self::pst::evaluate_piece_squares;

/// Classical evaluation in centipawns from the side to move's perspective.
pub fn evaluate_classical(pos: &Position) -> i32 {
    let board = pos.board();
    let white = MaterialInfo::of(board, Color::White);
    let black = MaterialInfo::of(board, Color::Black);

    let eval = side_score(board, Color::White, &white, &black)
        - side_score(board, Color::Black, &black, &white);
    if pos.white_to_move() { eval } else { -eval }
}

fn side_score(board: &Board, color: Color, mine: &MaterialInfo, enemy: &MaterialInfo) -> i32 {
    mine.material_score
        + evaluate_piece_squares(board, color, enemy.endgame_t)
        + mop_up(board, color, mine, enemy)
        + evaluate_pawns(board, color)
        + evaluate_king_attack(board, color)
}

/// How the NNUE output combines with the classical score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NnueBlend {
    /// Use the network output alone.
    #[default]
    Replace,
    /// Average the network output with the classical score.
    Augment,
}

/// Per-thread evaluator.
///
/// The search reports every make and unmake so the NNUE accumulators can
/// follow the board incrementally.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    nnue: Option<NnueEvaluator>,
    blend: NnueBlend,
}

impl Evaluation {
    /// Classical evaluation only.
    pub fn classical() -> Self {
        Self::default()
    }

    pub fn with_network(net: Arc<Network>, blend: NnueBlend) -> Self {
        Self {
            nnue: Some(NnueEvaluator::new(net)),
            blend,
        }
    }

    /// Switch the network on or off. Keeps the current accumulators when
    /// the same network is passed again.
    pub fn set_network(&mut self, net: Option<Arc<Network>>, blend: NnueBlend) {
        self.blend = blend;
        match (net, &self.nnue) {
            (Some(net), Some(current)) if Arc::ptr_eq(&net, current.network()) => {}
            (Some(net), _) => self.nnue = Some(NnueEvaluator::new(net)),
            (None, _) => self.nnue = None,
        }
    }

    pub fn uses_nnue(&self) -> bool {
        self.nnue.is_some()
    }

    pub fn nnue(&self) -> Option<&NnueEvaluator> {
        self.nnue.as_ref()
    }

    /// Rebuild all incremental state from `pos`.
    pub fn refresh(&mut self, pos: &Position) {
        if let Some(nnue) = &mut self.nnue {
            nnue.try_update_accumulators(pos.board(), true);
        }
    }

    /// Call with the position before `mv` is made.
    #[inline]
    pub fn on_make_move(&mut self, before: &Position, mv: Move) {
        if let Some(nnue) = &mut self.nnue {
            nnue.update_appended_features(mv, before.board(), false);
        }
    }

    /// Call with the position after `mv` has been taken back.
    #[inline]
    pub fn on_unmake_move(&mut self, restored: &Position, mv: Move) {
        if let Some(nnue) = &mut self.nnue {
            nnue.update_appended_features(mv, restored.board(), true);
        }
    }

    /// Score of `pos` from the side to move's perspective.
    pub fn evaluate(&mut self, pos: &Position) -> i32 {
        let Some(nnue) = &mut self.nnue else {
            return evaluate_classical(pos);
        };
        nnue.try_update_accumulators(pos.board(), false);
        let network = nnue.evaluate(pos.move_colour_index());
        match self.blend {
            NnueBlend::Replace => network,
            NnueBlend::Augment => (network + evaluate_classical(pos)) / 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_position_is_level() {
        assert_eq!(evaluate_classical(&Position::startpos()), 0);
    }

    #[test]
    fn score_is_relative_to_side_to_move() {
        let white = Position::from_fen("4k3/8/8/8/8/8/8/3QK3 w - - 0 1").unwrap();
        let black = Position::from_fen("4k3/8/8/8/8/8/8/3QK3 b - - 0 1").unwrap();
        let score = evaluate_classical(&white);
        assert!(score > 800);
        assert_eq!(evaluate_classical(&black), -score);
    }

    #[test]
    fn extra_knight_is_worth_about_a_knight() {
        let pos = Position::from_fen("rnbqkb1r/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").unwrap();
        let score = evaluate_classical(&pos);
        assert!((250..=400).contains(&score), "got {score}");
    }

    #[test]
    fn classical_evaluation_without_network() {
        let pos = Position::startpos();
        let mut eval = Evaluation::classical();
        assert!(!eval.uses_nnue());
        assert_eq!(eval.evaluate(&pos), evaluate_classical(&pos));
    }
}
