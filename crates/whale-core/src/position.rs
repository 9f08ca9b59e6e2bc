//! Game position with make/unmake history over a `chess::Board`.

use std::fmt::Write as _;
use std::str::FromStr;

use chess::{ALL_SQUARES, Board, BoardStatus, Color, EMPTY, Piece};

use crate::chess_move::Move;
use crate::error::PositionError;
use crate::movegen::generate_moves;

/// FEN of the standard starting position.
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// State that cannot be recovered from the board alone when unmaking a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameState {
    /// Piece removed by the move that produced this state.
    pub captured_piece: Option<Piece>,
    /// Half-moves since the last capture or pawn move.
    pub fifty_move_counter: u32,
    /// Zobrist key of the position.
    pub zobrist_key: u64,
}

#[derive(Clone)]
struct Snapshot {
    board: Board,
    state: GameState,
    mv: Move,
}

/// A chess position together with the moves that led to it.
///
/// Every `make_*` call pushes the previous board so that unmaking is a pop.
#[derive(Clone)]
pub struct Position {
    board: Board,
    state: GameState,
    ply_count: u32,
    history: Vec<Snapshot>,
}

impl Position {
    /// Parse a FEN string. Missing clock fields default to `0 1`.
    pub fn from_fen(fen: &str) -> Result<Position, PositionError> {
        let board = Board::from_str(fen).map_err(|err| PositionError::InvalidFen {
            fen: fen.to_string(),
            reason: format!("{err:?}"),
        })?;

        let fields: Vec<&str> = fen.split_whitespace().collect();
        let fifty_move_counter = parse_counter(fields.get(4).copied(), 0, "halfmove clock")?;
        let fullmove = parse_counter(fields.get(5).copied(), 1, "fullmove number")?.max(1);
        let black_to_move = board.side_to_move() == Color::Black;

        Ok(Position {
            board,
            state: GameState {
                captured_piece: None,
                fifty_move_counter,
                zobrist_key: board.get_hash(),
            },
            ply_count: (fullmove - 1) * 2 + black_to_move as u32,
            history: Vec::with_capacity(256),
        })
    }

    /// The standard starting position.
    pub fn startpos() -> Position {
        let board = Board::default();
        Position {
            board,
            state: GameState {
                captured_piece: None,
                fifty_move_counter: 0,
                zobrist_key: board.get_hash(),
            },
            ply_count: 0,
            history: Vec::with_capacity(256),
        }
    }

    /// Play a legal move.
    ///
    /// The move must come from [`generate_moves`] (or [`Position::parse_uci_move`])
    /// for this position.
    pub fn make_move(&mut self, mv: Move) {
        let moved = self.board.piece_on(mv.start());
        let captured = if mv.is_en_passant() {
            Some(Piece::Pawn)
        } else {
            self.board.piece_on(mv.target())
        };
        let next = self.board.make_move_new(mv.to_chess_move());
        let irreversible = captured.is_some() || moved == Some(Piece::Pawn);

        self.history.push(Snapshot {
            board: self.board,
            state: self.state,
            mv,
        });
        self.board = next;
        self.state = GameState {
            captured_piece: captured,
            fifty_move_counter: if irreversible {
                0
            } else {
                self.state.fifty_move_counter + 1
            },
            zobrist_key: next.get_hash(),
        };
        self.ply_count += 1;
    }

    /// Take back the last move (or null move). Does nothing at the root.
    pub fn unmake_move(&mut self) {
        debug_assert!(!self.history.is_empty(), "unmake_move with empty history");
        if let Some(snapshot) = self.history.pop() {
            self.board = snapshot.board;
            self.state = snapshot.state;
            self.ply_count -= 1;
        }
    }

    /// Pass the turn to the opponent.
    pub fn make_null_move(&mut self) -> Result<(), PositionError> {
        let next = self.board.null_move().ok_or(PositionError::NullMoveInCheck)?;
        self.history.push(Snapshot {
            board: self.board,
            state: self.state,
            mv: Move::NULL,
        });
        self.board = next;
        self.state = GameState {
            captured_piece: None,
            fifty_move_counter: self.state.fifty_move_counter + 1,
            zobrist_key: next.get_hash(),
        };
        self.ply_count += 1;
        Ok(())
    }

    /// Take back a null move made with [`Position::make_null_move`].
    pub fn unmake_null_move(&mut self) {
        self.unmake_move();
    }

    /// Find the legal move written as `text` in UCI notation.
    pub fn parse_uci_move(&self, text: &str) -> Result<Move, PositionError> {
        let wanted = text.trim().to_ascii_lowercase();
        generate_moves(self, false)
            .iter()
            .copied()
            .find(|mv| mv.to_uci() == wanted)
            .ok_or_else(|| PositionError::IllegalMove(text.to_string()))
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn zobrist_key(&self) -> u64 {
        self.state.zobrist_key
    }

    pub fn fifty_move_counter(&self) -> u32 {
        self.state.fifty_move_counter
    }

    /// Half-moves played since the start of the game.
    pub fn ply_count(&self) -> u32 {
        self.ply_count
    }

    pub fn side_to_move(&self) -> Color {
        self.board.side_to_move()
    }

    pub fn white_to_move(&self) -> bool {
        self.board.side_to_move() == Color::White
    }

    /// 0 when White is to move, 1 when Black is.
    pub fn move_colour_index(&self) -> usize {
        self.board.side_to_move().to_index()
    }

    pub fn is_in_check(&self) -> bool {
        *self.board.checkers() != EMPTY
    }

    pub fn king_square(&self, color: Color) -> usize {
        self.board.king_square(color).to_index()
    }

    /// Piece and colour on square index `sq`.
    pub fn piece_at(&self, sq: usize) -> Option<(Piece, Color)> {
        let square = ALL_SQUARES[sq];
        Some((self.board.piece_on(square)?, self.board.color_on(square)?))
    }

    /// The move that produced this position, if any.
    pub fn last_move(&self) -> Option<Move> {
        self.history.last().map(|snapshot| snapshot.mv)
    }

    /// Whether the game is over by checkmate or stalemate.
    pub fn status(&self) -> BoardStatus {
        self.board.status()
    }

    /// Zobrist keys since the last irreversible move, oldest first, ending
    /// with the current key.
    pub fn repetition_history(&self) -> Vec<u64> {
        let reversible = (self.state.fifty_move_counter as usize).min(self.history.len());
        let start = self.history.len() - reversible;
        self.history[start..]
            .iter()
            .map(|snapshot| snapshot.state.zobrist_key)
            .chain(std::iter::once(self.state.zobrist_key))
            .collect()
    }

    /// FEN including this position's move clocks.
    pub fn fen(&self) -> String {
        let board_fen = self.board.to_string();
        let fields: Vec<&str> = board_fen.split_whitespace().take(4).collect();
        format!(
            "{} {} {}",
            fields.join(" "),
            self.state.fifty_move_counter,
            self.ply_count / 2 + 1
        )
    }

    /// ASCII drawing of the board, rank 8 at the top.
    pub fn diagram(&self) -> String {
        let mut out = String::new();
        let last_target = self.last_move().filter(|mv| !mv.is_null()).map(|mv| mv.target_index());
        out.push_str("+---+---+---+---+---+---+---+---+\n");
        for rank in (0..8).rev() {
            for file in 0..8 {
                let sq = rank * 8 + file;
                let symbol = match self.piece_at(sq) {
                    Some((piece, color)) => piece_char(piece, color),
                    None => ' ',
                };
                if last_target == Some(sq) {
                    let _ = write!(out, "|({symbol})");
                } else {
                    let _ = write!(out, "| {symbol} ");
                }
            }
            let _ = writeln!(out, "| {}", rank + 1);
            out.push_str("+---+---+---+---+---+---+---+---+\n");
        }
        out.push_str("  a   b   c   d   e   f   g   h\n\n");
        let _ = writeln!(out, "Fen         : {}", self.fen());
        let _ = writeln!(out, "Zobrist Key : {:016X}", self.state.zobrist_key);
        out
    }
}

impl std::fmt::Debug for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Position")
            .field("fen", &self.fen())
            .field("history", &self.history.len())
            .finish()
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::startpos()
    }
}

fn parse_counter(
    field: Option<&str>,
    default: u32,
    name: &'static str,
) -> Result<u32, PositionError> {
    match field {
        None => Ok(default),
        Some(text) => text.parse().map_err(|_| PositionError::InvalidMoveCounter {
            field: name,
            found: text.to_string(),
        }),
    }
}

fn piece_char(piece: Piece, color: Color) -> char {
    let c = match piece {
        Piece::Pawn => 'p',
        Piece::Knight => 'n',
        Piece::Bishop => 'b',
        Piece::Rook => 'r',
        Piece::Queen => 'q',
        Piece::King => 'k',
    };
    if color == Color::White {
        c.to_ascii_uppercase()
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startpos_matches_starting_fen() {
        let a = Position::startpos();
        let b = Position::from_fen(STARTING_FEN).unwrap();
        assert_eq!(a.zobrist_key(), b.zobrist_key());
        assert_eq!(a.ply_count(), b.ply_count());
        assert!(a.white_to_move());
    }

    #[test]
    fn invalid_fen_is_rejected() {
        assert!(matches!(
            Position::from_fen("not a fen"),
            Err(PositionError::InvalidFen { .. })
        ));
    }

    #[test]
    fn bad_clock_is_rejected() {
        assert!(Position::from_fen("8/8/8/8/8/8/8/K1k5 w - - x 1").is_err());
    }

    #[test]
    fn clocks_are_parsed() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/4K2R b K - 17 30").unwrap();
        assert_eq!(pos.fifty_move_counter(), 17);
        assert_eq!(pos.ply_count(), 59);
        assert!(pos.fen().ends_with("17 30"));
    }

    #[test]
    fn make_unmake_restores_position() {
        let mut pos = Position::startpos();
        let key = pos.zobrist_key();
        let mv = pos.parse_uci_move("e2e4").unwrap();
        pos.make_move(mv);
        assert_ne!(pos.zobrist_key(), key);
        assert_eq!(pos.fifty_move_counter(), 0);
        assert_eq!(pos.last_move(), Some(mv));
        pos.unmake_move();
        assert_eq!(pos.zobrist_key(), key);
        assert_eq!(pos.ply_count(), 0);
        assert_eq!(pos.last_move(), None);
    }

    #[test]
    fn fifty_move_counter_tracks_reversible_moves() {
        let mut pos = Position::startpos();
        for uci in ["g1f3", "g8f6"] {
            let mv = pos.parse_uci_move(uci).unwrap();
            pos.make_move(mv);
        }
        assert_eq!(pos.fifty_move_counter(), 2);
        let mv = pos.parse_uci_move("e2e4").unwrap();
        pos.make_move(mv);
        assert_eq!(pos.fifty_move_counter(), 0);
    }

    #[test]
    fn capture_records_captured_piece() {
        let mut pos =
            Position::from_fen("rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 2")
                .unwrap();
        let mv = pos.parse_uci_move("e4d5").unwrap();
        pos.make_move(mv);
        assert_eq!(pos.state().captured_piece, Some(Piece::Pawn));
    }

    #[test]
    fn null_move_rejected_in_check() {
        let mut pos = Position::from_fen("4k3/8/8/8/8/8/4q3/4K3 w - - 0 1").unwrap();
        assert!(pos.is_in_check());
        assert_eq!(pos.make_null_move(), Err(PositionError::NullMoveInCheck));
    }

    #[test]
    fn null_move_roundtrip() {
        let mut pos = Position::startpos();
        let key = pos.zobrist_key();
        pos.make_null_move().unwrap();
        assert!(!pos.white_to_move());
        assert_ne!(pos.zobrist_key(), key);
        assert_eq!(pos.last_move(), Some(Move::NULL));
        pos.unmake_null_move();
        assert_eq!(pos.zobrist_key(), key);
        assert!(pos.white_to_move());
    }

    #[test]
    fn repetition_history_restarts_after_pawn_move() {
        let mut pos = Position::startpos();
        for uci in ["g1f3", "g8f6", "f3g1", "f6g8"] {
            let mv = pos.parse_uci_move(uci).unwrap();
            pos.make_move(mv);
        }
        let keys = pos.repetition_history();
        assert_eq!(keys.len(), 5);
        assert_eq!(keys[0], keys[4], "knights returned to their squares");

        let mv = pos.parse_uci_move("e2e4").unwrap();
        pos.make_move(mv);
        assert_eq!(pos.repetition_history(), vec![pos.zobrist_key()]);
    }

    #[test]
    fn illegal_uci_move_is_rejected() {
        let pos = Position::startpos();
        assert_eq!(
            pos.parse_uci_move("e2e5"),
            Err(PositionError::IllegalMove("e2e5".to_string()))
        );
    }

    #[test]
    fn king_square_and_piece_at() {
        let pos = Position::startpos();
        assert_eq!(pos.king_square(Color::White), 4);
        assert_eq!(pos.king_square(Color::Black), 60);
        assert_eq!(pos.piece_at(0), Some((Piece::Rook, Color::White)));
        assert_eq!(pos.piece_at(27), None);
    }

    #[test]
    fn diagram_marks_last_move() {
        let mut pos = Position::startpos();
        let mv = pos.parse_uci_move("e2e4").unwrap();
        pos.make_move(mv);
        let diagram = pos.diagram();
        assert!(diagram.contains("|(P)"), "{diagram}");
        assert!(diagram.contains("Fen"));
    }
}
