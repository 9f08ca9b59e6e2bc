//! Material counting and endgame transition.

use whale_core::{Board, Color, Piece};

pub const PAWN_VALUE: i32 = 100;
pub const KNIGHT_VALUE: i32 = 300;
pub const BISHOP_VALUE: i32 = 310;
pub const ROOK_VALUE: i32 = 500;
pub const QUEEN_VALUE: i32 = 900;

const QUEEN_ENDGAME_WEIGHT: i32 = 45;
const ROOK_ENDGAME_WEIGHT: i32 = 20;
const BISHOP_ENDGAME_WEIGHT: i32 = 10;
const KNIGHT_ENDGAME_WEIGHT: i32 = 10;

/// Weight at which the endgame transition starts: two rooks, two bishops,
/// two knights and one queen.
const ENDGAME_START_WEIGHT: i32 = 2 * ROOK_ENDGAME_WEIGHT
    + 2 * BISHOP_ENDGAME_WEIGHT
    + 2 * KNIGHT_ENDGAME_WEIGHT
    + QUEEN_ENDGAME_WEIGHT;

/// Material value of a piece (kings count zero).
pub const fn piece_value(piece: Piece) -> i32 {
    match piece {
        Piece::Pawn => PAWN_VALUE,
        Piece::Knight => KNIGHT_VALUE,
        Piece::Bishop => BISHOP_VALUE,
        Piece::Rook => ROOK_VALUE,
        Piece::Queen => QUEEN_VALUE,
        Piece::King => 0,
    }
}

/// Piece counts and derived values for one side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialInfo {
    pub material_score: i32,
    pub num_pawns: u32,
    pub num_knights: u32,
    pub num_bishops: u32,
    pub num_rooks: u32,
    pub num_queens: u32,
    /// 0.0 with the full non-pawn army on the board, rising to 1.0 as pieces
    /// come off.
    pub endgame_t: f32,
}

impl MaterialInfo {
    pub fn of(board: &Board, color: Color) -> MaterialInfo {
        let own = *board.color_combined(color);
        let count = |piece: Piece| (*board.pieces(piece) & own).popcnt();

        let num_pawns = count(Piece::Pawn);
        let num_knights = count(Piece::Knight);
        let num_bishops = count(Piece::Bishop);
        let num_rooks = count(Piece::Rook);
        let num_queens = count(Piece::Queen);

        let material_score = num_pawns as i32 * PAWN_VALUE
            + num_knights as i32 * KNIGHT_VALUE
            + num_bishops as i32 * BISHOP_VALUE
            + num_rooks as i32 * ROOK_VALUE
            + num_queens as i32 * QUEEN_VALUE;

        let weight = num_queens as i32 * QUEEN_ENDGAME_WEIGHT
            + num_rooks as i32 * ROOK_ENDGAME_WEIGHT
            + num_bishops as i32 * BISHOP_ENDGAME_WEIGHT
            + num_knights as i32 * KNIGHT_ENDGAME_WEIGHT;
        let endgame_t = 1.0 - (weight as f32 / ENDGAME_START_WEIGHT as f32).min(1.0);

        MaterialInfo {
            material_score,
            num_pawns,
            num_knights,
            num_bishops,
            num_rooks,
            num_queens,
            endgame_t,
        }
    }
}
