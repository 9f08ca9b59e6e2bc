//! Board adapter for whale: positions, packed moves, and legal move generation.

mod attacks;
mod chess_move;
mod error;
mod movegen;
mod position;

pub use attacks::{OpponentAttacks, attacked_squares, pawn_attacks, piece_attacks};
pub use chess::{ALL_SQUARES, BitBoard, Board, BoardStatus, Color, EMPTY, Piece};
pub use chess_move::{Move, MoveFlag};
pub use error::PositionError;
pub use movegen::{MAX_MOVES, MoveList, generate_moves, generate_moves_into, is_capture};
pub use position::{GameState, Position, STARTING_FEN};
