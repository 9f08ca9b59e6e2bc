//! Attack sets for evaluation and move ordering.

use chess::{
    ALL_SQUARES, BitBoard, Board, Color, EMPTY, Piece, get_bishop_moves, get_king_moves,
    get_knight_moves, get_pawn_attacks, get_rook_moves,
};

/// Squares attacked by `piece` of `color` standing on square index `sq`,
/// given the occupancy `occupied`.
pub fn piece_attacks(piece: Piece, color: Color, sq: usize, occupied: BitBoard) -> BitBoard {
    let square = ALL_SQUARES[sq];
    match piece {
        Piece::Pawn => get_pawn_attacks(square, color, !EMPTY),
        Piece::Knight => get_knight_moves(square),
        Piece::Bishop => get_bishop_moves(square, occupied),
        Piece::Rook => get_rook_moves(square, occupied),
        Piece::Queen => get_bishop_moves(square, occupied) | get_rook_moves(square, occupied),
        Piece::King => get_king_moves(square),
    }
}

/// Squares attacked by the pawns of `color`.
pub fn pawn_attacks(board: &Board, color: Color) -> BitBoard {
    let pawns = *board.pieces(Piece::Pawn) & *board.color_combined(color);
    pawns.fold(EMPTY, |acc, sq| acc | get_pawn_attacks(sq, color, !EMPTY))
}

/// Squares attacked by any piece of `color`.
pub fn attacked_squares(board: &Board, color: Color) -> BitBoard {
    let occupied = *board.combined();
    let own = *board.color_combined(color);
    let mut attacks = pawn_attacks(board, color);
    for piece in [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen, Piece::King] {
        for sq in *board.pieces(piece) & own {
            attacks |= piece_attacks(piece, color, sq.to_index(), occupied);
        }
    }
    attacks
}

/// Attack maps of the side not to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpponentAttacks {
    /// Every square the opponent attacks.
    pub all: u64,
    /// Squares the opponent's pawns attack.
    pub pawns: u64,
}

impl OpponentAttacks {
    pub fn of(board: &Board) -> OpponentAttacks {
        let opponent = !board.side_to_move();
        OpponentAttacks {
            all: attacked_squares(board, opponent).0,
            pawns: pawn_attacks(board, opponent).0,
        }
    }
}
