//! HalfKP feature indexing.
//!
//! A feature is a (king square, piece, piece square) triple seen from one
//! perspective. The black perspective flips the board (`sq ^ 63`) and swaps
//! the piece colours, so both perspectives share one weight table.

use whale_core::{ALL_SQUARES, Board, Color, Move, Piece};

/// Number of (piece, square) slots per king square, including the unused
/// slot 0.
pub const PS_END: usize = 641;

/// Total number of HalfKP input features.
pub const NUM_FEATURES: usize = PS_END * 64;

/// Square index as seen from `perspective` (0 = white, 1 = black).
#[inline]
pub const fn orient(perspective: usize, sq: usize) -> usize {
    sq ^ (perspective * 63)
}

/// Offset of a piece in the (piece, square) block: own pieces and enemy
/// pieces of each kind take alternating 64-square slots after slot 0.
#[inline]
fn piece_offset(perspective: usize, piece: Piece, color: Color) -> usize {
    let theirs = usize::from(color.to_index() != perspective);
    1 + 64 * (2 * piece.to_index() + theirs)
}

/// Feature index for `piece` of `color` on `sq`, seen from `perspective`
/// with that perspective's king on the already oriented square `king`.
#[inline]
pub fn feature_index(perspective: usize, piece: Piece, color: Color, sq: usize, king: usize) -> usize {
    debug_assert!(piece != Piece::King, "kings are not features");
    orient(perspective, sq) + piece_offset(perspective, piece, color) + PS_END * king
}

/// Oriented king square of `perspective` on `board`.
#[inline]
pub fn oriented_king(board: &Board, perspective: usize) -> usize {
    let color = if perspective == 0 { Color::White } else { Color::Black };
    orient(perspective, board.king_square(color).to_index())
}

/// Every active feature of `board` from `perspective`.
pub fn active_features(board: &Board, perspective: usize) -> impl Iterator<Item = usize> + '_ {
    let king = oriented_king(board, perspective);
    (*board.combined() & !*board.pieces(Piece::King)).filter_map(move |sq| {
        let piece = board.piece_on(sq)?;
        let color = board.color_on(sq)?;
        Some(feature_index(perspective, piece, color, sq.to_index(), king))
    })
}

/// Append the features `mv` adds and removes for `perspective`, given the
/// board before the move.
///
/// King moves change no piece feature for the mover; the caller refreshes
/// that perspective instead. For an undo, pass the lists swapped.
pub fn append_changed_indices(
    added: &mut Vec<usize>,
    removed: &mut Vec<usize>,
    mv: Move,
    before: &Board,
    perspective: usize,
) {
    let start = mv.start_index();
    let target = mv.target_index();
    let Some(moved) = before.piece_on(ALL_SQUARES[start]) else {
        return;
    };
    let mover = before.side_to_move();
    let king = oriented_king(before, perspective);
    let is_king_move = moved == Piece::King;

    if !is_king_move {
        removed.push(feature_index(perspective, moved, mover, start, king));
    }

    if let Some(captured) = before.piece_on(ALL_SQUARES[target]) {
        removed.push(feature_index(perspective, captured, !mover, target, king));
    } else if mv.is_en_passant() {
        let victim = if mover == Color::White { target - 8 } else { target + 8 };
        removed.push(feature_index(perspective, Piece::Pawn, !mover, victim, king));
    }

    if let Some(promoted) = mv.promotion_piece() {
        added.push(feature_index(perspective, promoted, mover, target, king));
    } else if !is_king_move {
        added.push(feature_index(perspective, moved, mover, target, king));
    }

    if mv.is_castle() {
        let kingside = target % 8 == 6;
        let (rook_from, rook_to) = if kingside {
            (target + 1, target - 1)
        } else {
            (target - 2, target + 1)
        };
        removed.push(feature_index(perspective, Piece::Rook, mover, rook_from, king));
        added.push(feature_index(perspective, Piece::Rook, mover, rook_to, king));
    }
}

#[cfg(test)]
mod tests {
    use whale_core::{MoveFlag, Position};

    use super::*;

    #[test]
    fn offsets_follow_piece_kind_and_colour() {
        assert_eq!(piece_offset(0, Piece::Pawn, Color::White), 1);
        assert_eq!(piece_offset(0, Piece::Pawn, Color::Black), 65);
        assert_eq!(piece_offset(0, Piece::Queen, Color::White), 513);
        assert_eq!(piece_offset(0, Piece::Queen, Color::Black), 577);
        // Colours swap from the black perspective.
        assert_eq!(piece_offset(1, Piece::Pawn, Color::Black), 1);
        assert_eq!(piece_offset(1, Piece::Knight, Color::White), 193);
    }

    #[test]
    fn indices_stay_in_range() {
        for perspective in 0..2 {
            for king in 0..64 {
                for sq in 0..64 {
                    for piece in [Piece::Pawn, Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen] {
                        for color in [Color::White, Color::Black] {
                            let idx = feature_index(perspective, piece, color, sq, king);
                            assert!(idx < NUM_FEATURES);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn starting_position_has_thirty_features_per_side() {
        let board = Board::default();
        assert_eq!(active_features(&board, 0).count(), 30);
        assert_eq!(active_features(&board, 1).count(), 30);
    }

    #[test]
    fn quiet_move_swaps_one_feature() {
        let pos = Position::startpos();
        let mv = pos.parse_uci_move("g1f3").unwrap();
        let (mut added, mut removed) = (Vec::new(), Vec::new());
        append_changed_indices(&mut added, &mut removed, mv, pos.board(), 0);
        let king = oriented_king(pos.board(), 0);
        assert_eq!(removed, vec![feature_index(0, Piece::Knight, Color::White, 6, king)]);
        assert_eq!(added, vec![feature_index(0, Piece::Knight, Color::White, 21, king)]);
    }

    #[test]
    fn en_passant_removes_the_passed_pawn() {
        let pos = Position::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1").unwrap();
        let mv = pos.parse_uci_move("e5d6").unwrap();
        assert_eq!(mv.flag(), MoveFlag::EnPassantCapture);
        let (mut added, mut removed) = (Vec::new(), Vec::new());
        append_changed_indices(&mut added, &mut removed, mv, pos.board(), 1);
        let king = oriented_king(pos.board(), 1);
        assert!(removed.contains(&feature_index(1, Piece::Pawn, Color::Black, 35, king)));
        assert_eq!(added.len(), 1);
    }

    #[test]
    fn castling_moves_the_rook_only() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/R3K2R w KQ - 0 1").unwrap();
        let mv = pos.parse_uci_move("e1c1").unwrap();
        let (mut added, mut removed) = (Vec::new(), Vec::new());
        append_changed_indices(&mut added, &mut removed, mv, pos.board(), 1);
        let king = oriented_king(pos.board(), 1);
        assert_eq!(removed, vec![feature_index(1, Piece::Rook, Color::White, 0, king)]);
        assert_eq!(added, vec![feature_index(1, Piece::Rook, Color::White, 3, king)]);
    }
}
