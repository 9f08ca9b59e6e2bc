//! Error types for position setup and move application.

/// Errors raised while building or mutating a [`Position`](crate::Position).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    /// The FEN string could not be parsed into a legal position.
    #[error("invalid FEN \"{fen}\": {reason}")]
    InvalidFen {
        /// The offending FEN string.
        fen: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A move counter (halfmove clock or fullmove number) is not a valid number.
    #[error("invalid {field} in FEN: \"{found}\"")]
    InvalidMoveCounter {
        /// The field name ("halfmove clock" or "fullmove number").
        field: &'static str,
        /// The invalid string.
        found: String,
    },

    /// The UCI move text does not name a legal move in the current position.
    #[error("illegal or malformed move \"{0}\"")]
    IllegalMove(String),

    /// A null move was requested while the side to move is in check.
    #[error("cannot make a null move while in check")]
    NullMoveInCheck,
}
