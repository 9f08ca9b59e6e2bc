//! Move ordering: hash move, capture delta, killers and history.

use std::sync::OnceLock;

use whale_core::{Board, Color, MAX_MOVES, Move, MoveList, OpponentAttacks, Piece};

use crate::eval::pst::piece_square_value;
use crate::search::heuristics::{HistoryTable, KillerTable};

const HASH_MOVE_BIAS: i32 = 100_000_000;
const WINNING_CAPTURE_BIAS: i32 = 8_000_000;
const PROMOTE_BIAS: i32 = 6_000_000;
const KILLER_BIAS: i32 = 4_000_000;
const LOSING_CAPTURE_BIAS: i32 = 2_000_000;

const PAWN_ATTACKED_PENALTY: i32 = 50;
const ATTACKED_PENALTY: i32 = 25;

/// Piece values used only for ordering captures.
const fn ordering_value(piece: Piece) -> i32 {
    match piece {
        Piece::Queen => 900,
        Piece::Rook => 500,
        Piece::Knight | Piece::Bishop => 300,
        Piece::Pawn => 100,
        Piece::King => 0,
    }
}

/// Context shared by every move scored at one node.
struct ScoreContext<'a> {
    board: &'a Board,
    attacks: OpponentAttacks,
    killers: Option<(&'a KillerTable, usize)>,
    history: &'a HistoryTable,
    colour: usize,
}

/// Ordering score of `mv`. Higher scores are searched first.
///
/// Bands:
/// - capture that wins material or lands on an undefended square: 8M + delta
/// - quiet queen promotion: 6M
/// - killer: 4M + history (history never exceeds 1M)
/// - capture into a defended square that loses material: 2M + delta
/// - other quiet moves: history plus a piece-square delta
fn score_move(ctx: &ScoreContext<'_>, mv: Move) -> i32 {
    let board = ctx.board;
    let Some(piece) = board.piece_on(mv.start()) else {
        return 0;
    };
    let target_bit = 1u64 << mv.target_index();
    let captured = if mv.is_en_passant() {
        Some(Piece::Pawn)
    } else {
        board.piece_on(mv.target())
    };

    let mut score = 0;
    if let Some(victim) = captured {
        let delta = ordering_value(victim) - ordering_value(piece);
        let defended = ctx.attacks.all & target_bit != 0;
        let bias = if defended && delta < 0 {
            LOSING_CAPTURE_BIAS
        } else {
            WINNING_CAPTURE_BIAS
        };
        score += bias + delta;
    }

    match piece {
        Piece::Pawn => {
            if mv.promotion_piece() == Some(Piece::Queen) && captured.is_none() {
                score += PROMOTE_BIAS;
            }
        }
        Piece::King => {}
        _ => {
            let is_white = board.side_to_move() == Color::White;
            score += piece_square_value(piece, is_white, mv.target_index())
                - piece_square_value(piece, is_white, mv.start_index());
            if ctx.attacks.pawns & target_bit != 0 {
                score -= PAWN_ATTACKED_PENALTY;
            } else if ctx.attacks.all & target_bit != 0 {
                score -= ATTACKED_PENALTY;
            }
        }
    }

    if captured.is_none() {
        if let Some((killers, ply)) = ctx.killers
            && killers.is_killer(ply, mv)
        {
            score += KILLER_BIAS;
        }
        score += ctx.history.score(ctx.colour, mv);
    }
    score
}

// ── LMR Table ─────────────────────────────────────────────────────────────────

const LMR_TABLE_LEN: usize = 256;

/// `floor(20.26 · ln i)`, indexed by depth or move number.
static LMR_TABLE: OnceLock<[i32; LMR_TABLE_LEN]> = OnceLock::new();

fn lmr_table() -> &'static [i32; LMR_TABLE_LEN] {
    LMR_TABLE.get_or_init(|| {
        let mut t = [0i32; LMR_TABLE_LEN];
        for (i, slot) in t.iter_mut().enumerate().skip(1) {
            *slot = (20.26 * (i as f64).ln()).floor() as i32;
        }
        t
    })
}

/// Late-move reduction in plies.
///
/// `delta` is the current window width and `root_delta` the width at the
/// root; tight windows relative to the root reduce more.
pub fn lmr_reduction(depth: i32, move_number: usize, delta: i32, root_delta: i32) -> i32 {
    let table = lmr_table();
    let d = table[depth.clamp(0, LMR_TABLE_LEN as i32 - 1) as usize] as i64;
    let m = table[move_number.min(LMR_TABLE_LEN - 1)] as i64;
    let window = delta as i64 * 1073 / (root_delta.max(1) as i64);
    ((d * m + 1372 - window) / 1024) as i32
}

// ── Move Picker ────────────────────────────────────────────────────────────────

/// Incremental move picker using selection sort.
///
/// Yields moves in descending score order; equal scores come out in
/// generation order.
pub struct MovePicker {
    moves: [Move; MAX_MOVES],
    scores: [i32; MAX_MOVES],
    len: usize,
    cursor: usize,
}

impl MovePicker {
    /// Picker for the main search.
    ///
    /// `hash_move`, when present in the list, is always yielded first.
    pub fn new(
        moves: &MoveList,
        board: &Board,
        hash_move: Move,
        killers: &KillerTable,
        history: &HistoryTable,
        ply: usize,
    ) -> Self {
        let ctx = ScoreContext {
            board,
            attacks: OpponentAttacks::of(board),
            killers: Some((killers, ply)),
            history,
            colour: board.side_to_move().to_index(),
        };
        Self::build(moves, hash_move, &ctx)
    }

    /// Picker for quiescence search: no killers.
    pub fn new_quiescence(moves: &MoveList, board: &Board, history: &HistoryTable) -> Self {
        let ctx = ScoreContext {
            board,
            attacks: OpponentAttacks::of(board),
            killers: None,
            history,
            colour: board.side_to_move().to_index(),
        };
        Self::build(moves, Move::NULL, &ctx)
    }

    fn build(moves: &MoveList, hash_move: Move, ctx: &ScoreContext<'_>) -> Self {
        let mut picker = Self {
            moves: [Move::NULL; MAX_MOVES],
            scores: [0; MAX_MOVES],
            len: moves.len(),
            cursor: 0,
        };
        for (i, &mv) in moves.iter().enumerate() {
            picker.moves[i] = mv;
            picker.scores[i] = if !hash_move.is_null() && mv == hash_move {
                HASH_MOVE_BIAS
            } else {
                score_move(ctx, mv)
            };
        }
        picker
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Yield the next highest-scored move, or `None` once all are used.
    pub fn pick_next(&mut self) -> Option<Move> {
        if self.cursor >= self.len {
            return None;
        }

        let mut best_idx = self.cursor;
        let mut best_score = self.scores[self.cursor];
        for i in (self.cursor + 1)..self.len {
            if self.scores[i] > best_score {
                best_score = self.scores[i];
                best_idx = i;
            }
        }

        // Skipped moves stay in generation order.
        self.moves[self.cursor..=best_idx].rotate_right(1);
        self.scores[self.cursor..=best_idx].rotate_right(1);

        let mv = self.moves[self.cursor];
        self.cursor += 1;
        Some(mv)
    }
}

impl std::fmt::Debug for MovePicker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MovePicker")
            .field("len", &self.len)
            .field("cursor", &self.cursor)
            .finish()
    }
}
