//! Piece-square tables.
//!
//! Tables are written from White's point of view the way a board is drawn:
//! index 0 = A8, index 7 = H8, ..., index 63 = H1. Use [`read`] to look up a
//! square for either colour.

use whale_core::{Board, Color, Piece};

#[rustfmt::skip]
pub const PAWNS_START: [i32; 64] = [
     0,   0,   0,   0,   0,   0,   0,   0,
    50,  50,  50,  50,  50,  50,  50,  50,
    10,  10,  20,  30,  30,  20,  10,  10,
     5,   5,  10,  25,  25,  10,   5,   5,
     0,   0,   0,  20,  20,   0,   0,   0,
     5,  -5, -10,   0,   0, -10,  -5,   5,
     5,  10,  10, -20, -20,  10,  10,   5,
     0,   0,   0,   0,   0,   0,   0,   0,
];

#[rustfmt::skip]
pub const PAWNS_END: [i32; 64] = [
     0,   0,   0,   0,   0,   0,   0,   0,
    80,  80,  80,  80,  80,  80,  80,  80,
    50,  50,  50,  50,  50,  50,  50,  50,
    30,  30,  30,  30,  30,  30,  30,  30,
    20,  20,  20,  20,  20,  20,  20,  20,
    10,  10,  10,  10,  10,  10,  10,  10,
    10,  10,  10,  10,  10,  10,  10,  10,
     0,   0,   0,   0,   0,   0,   0,   0,
];

#[rustfmt::skip]
pub const KNIGHTS: [i32; 64] = [
    -50, -40, -30, -30, -30, -30, -40, -50,
    -40, -20,   0,   0,   0,   0, -20, -40,
    -30,   0,  10,  15,  15,  10,   0, -30,
    -30,   5,  15,  20,  20,  15,   5, -30,
    -30,   0,  15,  20,  20,  15,   0, -30,
    -30,   5,  10,  15,  15,  10,   5, -30,
    -40, -20,   0,   5,   5,   0, -20, -40,
    -50, -40, -30, -30, -30, -30, -40, -50,
];

#[rustfmt::skip]
pub const BISHOPS: [i32; 64] = [
    -20, -10, -10, -10, -10, -10, -10, -20,
    -10,   0,   0,   0,   0,   0,   0, -10,
    -10,   0,   5,  10,  10,   5,   0, -10,
    -10,   5,   5,  10,  10,   5,   5, -10,
    -10,   0,  10,  10,  10,  10,   0, -10,
    -10,  10,  10,  10,  10,  10,  10, -10,
    -10,   5,   0,   0,   0,   0,   5, -10,
    -20, -10, -10, -10, -10, -10, -10, -20,
];

#[rustfmt::skip]
pub const ROOKS: [i32; 64] = [
     0,   0,   0,   0,   0,   0,   0,   0,
     5,  10,  10,  10,  10,  10,  10,   5,
    -5,   0,   0,   0,   0,   0,   0,  -5,
    -5,   0,   0,   0,   0,   0,   0,  -5,
    -5,   0,   0,   0,   0,   0,   0,  -5,
    -5,   0,   0,   0,   0,   0,   0,  -5,
    -5,   0,   0,   0,   0,   0,   0,  -5,
     0,   0,   0,   5,   5,   0,   0,   0,
];

#[rustfmt::skip]
pub const QUEENS: [i32; 64] = [
    -20, -10, -10,  -5,  -5, -10, -10, -20,
    -10,   0,   0,   0,   0,   0,   0, -10,
    -10,   0,   5,   5,   5,   5,   0, -10,
     -5,   0,   5,   5,   5,   5,   0,  -5,
      0,   0,   5,   5,   5,   5,   0,  -5,
    -10,   5,   5,   5,   5,   5,   0, -10,
    -10,   0,   5,   0,   0,   0,   0, -10,
    -20, -10, -10,  -5,  -5, -10, -10, -20,
];

#[rustfmt::skip]
pub const KING_START: [i32; 64] = [
    -80, -70, -70, -70, -70, -70, -70, -80,
    -60, -60, -60, -60, -60, -60, -60, -60,
    -40, -50, -50, -60, -60, -50, -50, -40,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -20, -30, -30, -40, -40, -30, -30, -20,
    -10, -20, -20, -20, -20, -20, -20, -10,
     20,  20,  -5,  -5,  -5,  -5,  20,  20,
     20,  30,  10,   0,   0,  10,  30,  20,
];

#[rustfmt::skip]
pub const KING_END: [i32; 64] = [
    -20, -10, -10, -10, -10, -10, -10, -20,
     -5,   0,   5,   5,   5,   5,   0,  -5,
    -10,  -5,  20,  30,  30,  20,  -5, -10,
    -15, -10,  35,  45,  45,  35, -10, -15,
    -20, -15,  30,  40,  40,  30, -15, -20,
    -25, -20,  20,  25,  25,  20, -20, -25,
    -30, -25,   0,   0,   0,   0, -25, -30,
    -50, -30, -30, -30, -30, -30, -30, -50,
];

/// Value of `table` for a piece on square index `sq` (a1 = 0).
#[inline]
pub fn read(table: &[i32; 64], sq: usize, is_white: bool) -> i32 {
    if is_white { table[sq ^ 56] } else { table[sq] }
}

/// Untapered value of `piece` on `sq`; pawns and kings use their opening tables.
pub fn piece_square_value(piece: Piece, is_white: bool, sq: usize) -> i32 {
    let table = match piece {
        Piece::Pawn => &PAWNS_START,
        Piece::Knight => &KNIGHTS,
        Piece::Bishop => &BISHOPS,
        Piece::Rook => &ROOKS,
        Piece::Queen => &QUEENS,
        Piece::King => &KING_START,
    };
    read(table, sq, is_white)
}

fn sum_table(board: &Board, color: Color, piece: Piece, table: &[i32; 64]) -> i32 {
    let is_white = color == Color::White;
    (*board.pieces(piece) & *board.color_combined(color))
        .map(|sq| read(table, sq.to_index(), is_white))
        .sum()
}

/// Piece-square score for `color`. Pawns and the king blend their opening and
/// endgame tables by `endgame_t`.
pub fn evaluate_piece_squares(board: &Board, color: Color, endgame_t: f32) -> i32 {
    let is_white = color == Color::White;
    let mut value = sum_table(board, color, Piece::Rook, &ROOKS)
        + sum_table(board, color, Piece::Knight, &KNIGHTS)
        + sum_table(board, color, Piece::Bishop, &BISHOPS)
        + sum_table(board, color, Piece::Queen, &QUEENS);

    let pawn_early = sum_table(board, color, Piece::Pawn, &PAWNS_START);
    let pawn_late = sum_table(board, color, Piece::Pawn, &PAWNS_END);
    value += (pawn_early as f32 * (1.0 - endgame_t)) as i32;
    value += (pawn_late as f32 * endgame_t) as i32;

    let king = board.king_square(color).to_index();
    value += (read(&KING_START, king, is_white) as f32 * (1.0 - endgame_t)) as i32;
    value += (read(&KING_END, king, is_white) as f32 * endgame_t) as i32;

    value
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn read_mirrors_colours() {
        // e2 for White and e7 for Black are the same table entry.
        assert_eq!(read(&PAWNS_START, 12, true), -20);
        assert_eq!(read(&PAWNS_START, 52, false), -20);
        // a1 for White is the bottom-left corner of the drawing.
        assert_eq!(read(&KING_START, 0, true), 20);
        assert_eq!(read(&KING_START, 56, false), 20);
    }

    #[test]
    fn starting_position_is_symmetric() {
        let board = Board::default();
        let white = evaluate_piece_squares(&board, Color::White, 0.0);
        let black = evaluate_piece_squares(&board, Color::Black, 0.0);
        assert_eq!(white, black);
    }

    #[test]
    fn king_table_follows_endgame_fraction() {
        let board = Board::from_str("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let opening = evaluate_piece_squares(&board, Color::White, 0.0);
        let endgame = evaluate_piece_squares(&board, Color::White, 1.0);
        assert_eq!(opening, 0);
        assert_eq!(endgame, -30);
    }

    #[test]
    fn knight_prefers_centre() {
        assert!(piece_square_value(Piece::Knight, true, 27) > piece_square_value(Piece::Knight, true, 0));
    }
}
