//! Legal move generation into a fixed-capacity move list.

use std::ops::Index;

use chess::{Board, ChessMove, MoveGen, Piece};

use crate::chess_move::{Move, MoveFlag};
use crate::position::Position;

/// Upper bound on the number of legal moves in any chess position.
pub const MAX_MOVES: usize = 256;

/// A stack-allocated list of moves.
#[derive(Clone)]
pub struct MoveList {
    moves: [Move; MAX_MOVES],
    len: usize,
}

impl MoveList {
    pub const fn new() -> MoveList {
        MoveList {
            moves: [Move::NULL; MAX_MOVES],
            len: 0,
        }
    }

    /// Append a move. Moves beyond capacity are dropped.
    pub fn push(&mut self, mv: Move) {
        debug_assert!(self.len < MAX_MOVES, "move list overflow");
        if self.len < MAX_MOVES {
            self.moves[self.len] = mv;
            self.len += 1;
        }
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[Move] {
        &self.moves[..self.len]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Move> {
        self.as_slice().iter()
    }

    pub fn contains(&self, mv: Move) -> bool {
        self.as_slice().contains(&mv)
    }
}

impl Default for MoveList {
    fn default() -> Self {
        MoveList::new()
    }
}

impl Index<usize> for MoveList {
    type Output = Move;

    fn index(&self, index: usize) -> &Move {
        &self.as_slice()[index]
    }
}

impl<'a> IntoIterator for &'a MoveList {
    type Item = &'a Move;
    type IntoIter = std::slice::Iter<'a, Move>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl std::fmt::Debug for MoveList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Generate the legal moves of `position`.
pub fn generate_moves(position: &Position, captures_only: bool) -> MoveList {
    let mut list = MoveList::new();
    generate_moves_into(position, &mut list, captures_only);
    list
}

/// Generate legal moves into an existing list, replacing its contents.
///
/// With `captures_only` set, only moves that remove an enemy piece are
/// produced (including en passant and capturing promotions).
pub fn generate_moves_into(position: &Position, list: &mut MoveList, captures_only: bool) {
    list.clear();
    let board = position.board();
    let mut generator = MoveGen::new_legal(board);

    if captures_only && board.en_passant().is_none() {
        generator.set_iterator_mask(*board.color_combined(!board.side_to_move()));
        for cm in generator {
            list.push(classify(board, cm));
        }
        return;
    }

    for cm in generator {
        let mv = classify(board, cm);
        if !captures_only || is_capture(board, mv) {
            list.push(mv);
        }
    }
}

/// Whether `mv` removes an enemy piece from `board`.
pub fn is_capture(board: &Board, mv: Move) -> bool {
    mv.is_en_passant() || board.piece_on(mv.target()).is_some()
}

fn classify(board: &Board, cm: ChessMove) -> Move {
    let start = cm.get_source();
    let target = cm.get_dest();
    let flag = match cm.get_promotion() {
        Some(piece) => MoveFlag::promotion(piece).unwrap_or(MoveFlag::PromoteToQueen),
        None => match board.piece_on(start) {
            Some(Piece::Pawn) => {
                let rank_delta = start.get_rank().to_index().abs_diff(target.get_rank().to_index());
                if rank_delta == 2 {
                    MoveFlag::PawnTwoUp
                } else if start.get_file() != target.get_file() && board.piece_on(target).is_none() {
                    MoveFlag::EnPassantCapture
                } else {
                    MoveFlag::None
                }
            }
            Some(Piece::King)
                if start.get_file().to_index().abs_diff(target.get_file().to_index()) == 2 =>
            {
                MoveFlag::Castle
            }
            _ => MoveFlag::None,
        },
    };
    Move::new(start.to_index(), target.to_index(), flag)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

    #[test]
    fn startpos_has_twenty_moves() {
        let moves = generate_moves(&Position::startpos(), false);
        assert_eq!(moves.len(), 20);
        let double_pushes = moves.iter().filter(|mv| mv.flag() == MoveFlag::PawnTwoUp).count();
        assert_eq!(double_pushes, 8);
    }

    #[test]
    fn startpos_has_no_captures() {
        assert!(generate_moves(&Position::startpos(), true).is_empty());
    }

    #[test]
    fn kiwipete_counts() {
        let pos = Position::from_fen(KIWIPETE).unwrap();
        let moves = generate_moves(&pos, false);
        assert_eq!(moves.len(), 48);
        let castles = moves.iter().filter(|mv| mv.is_castle()).count();
        assert_eq!(castles, 2);
        let captures = generate_moves(&pos, true);
        assert_eq!(captures.len(), 8);
        assert!(captures.iter().all(|&mv| is_capture(pos.board(), mv)));
    }

    #[test]
    fn en_passant_is_flagged_and_counted_as_capture() {
        let pos =
            Position::from_fen("rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3")
                .unwrap();
        let ep = pos.parse_uci_move("e5f6").unwrap();
        assert_eq!(ep.flag(), MoveFlag::EnPassantCapture);
        assert!(generate_moves(&pos, true).contains(ep));
    }

    #[test]
    fn promotions_are_flagged() {
        let pos = Position::from_fen("8/P6k/8/8/8/8/8/K7 w - - 0 1").unwrap();
        let moves = generate_moves(&pos, false);
        let promos: Vec<_> = moves.iter().filter(|mv| mv.is_promotion()).collect();
        assert_eq!(promos.len(), 4);
        assert!(generate_moves(&pos, true).is_empty());
    }

    #[test]
    fn checkmated_side_has_no_moves() {
        let pos = Position::from_fen("7k/6Q1/5K2/8/8/8/8/8 b - - 0 1").unwrap();
        assert!(generate_moves(&pos, false).is_empty());
    }
}
