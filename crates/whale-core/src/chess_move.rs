//! Chess move representation, bit-packed into a u16.

use std::fmt;

use chess::{ALL_SQUARES, ChessMove, Piece, Square};

const START_MASK: u16 = 0x003F;
const TARGET_MASK: u16 = 0x0FC0;
const FLAG_MASK: u16 = 0xF000;
const TARGET_SHIFT: u32 = 6;
const FLAG_SHIFT: u32 = 12;

/// Extra information attached to a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MoveFlag {
    None = 0,
    EnPassantCapture = 1,
    Castle = 2,
    PawnTwoUp = 3,
    PromoteToQueen = 4,
    PromoteToKnight = 5,
    PromoteToRook = 6,
    PromoteToBishop = 7,
}

impl MoveFlag {
    const fn from_bits(bits: u16) -> MoveFlag {
        match bits {
            1 => MoveFlag::EnPassantCapture,
            2 => MoveFlag::Castle,
            3 => MoveFlag::PawnTwoUp,
            4 => MoveFlag::PromoteToQueen,
            5 => MoveFlag::PromoteToKnight,
            6 => MoveFlag::PromoteToRook,
            7 => MoveFlag::PromoteToBishop,
            _ => MoveFlag::None,
        }
    }

    /// Flag for a promotion to `piece`, or `None` if `piece` cannot be promoted to.
    pub const fn promotion(piece: Piece) -> Option<MoveFlag> {
        match piece {
            Piece::Queen => Some(MoveFlag::PromoteToQueen),
            Piece::Knight => Some(MoveFlag::PromoteToKnight),
            Piece::Rook => Some(MoveFlag::PromoteToRook),
            Piece::Bishop => Some(MoveFlag::PromoteToBishop),
            _ => None,
        }
    }
}

/// A chess move encoded in 16 bits.
///
/// ```text
/// bits  0-5:  start square  (a1 = 0, h8 = 63)
/// bits  6-11: target square
/// bits 12-15: flag          (see MoveFlag)
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Move(u16);

impl Move {
    /// Null move sentinel (a1a1, no flag). Never a legal move.
    pub const NULL: Move = Move(0);

    /// Create a move from square indices and a flag.
    pub const fn new(start: usize, target: usize, flag: MoveFlag) -> Move {
        Move(
            (start as u16 & START_MASK)
                | (((target as u16) << TARGET_SHIFT) & TARGET_MASK)
                | ((flag as u16) << FLAG_SHIFT),
        )
    }

    /// Rebuild a move from its raw 16-bit encoding.
    pub const fn from_raw(raw: u16) -> Move {
        Move(raw)
    }

    /// The raw 16-bit encoding.
    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn start_index(self) -> usize {
        (self.0 & START_MASK) as usize
    }

    pub const fn target_index(self) -> usize {
        ((self.0 & TARGET_MASK) >> TARGET_SHIFT) as usize
    }

    pub fn start(self) -> Square {
        ALL_SQUARES[self.start_index()]
    }

    pub fn target(self) -> Square {
        ALL_SQUARES[self.target_index()]
    }

    pub const fn flag(self) -> MoveFlag {
        MoveFlag::from_bits((self.0 & FLAG_MASK) >> FLAG_SHIFT)
    }

    /// Return `true` if this is the null move sentinel.
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    pub const fn is_promotion(self) -> bool {
        (self.0 >> FLAG_SHIFT) >= MoveFlag::PromoteToQueen as u16
    }

    pub const fn is_en_passant(self) -> bool {
        matches!(self.flag(), MoveFlag::EnPassantCapture)
    }

    pub const fn is_castle(self) -> bool {
        matches!(self.flag(), MoveFlag::Castle)
    }

    /// The piece a pawn promotes to, if this is a promotion.
    pub const fn promotion_piece(self) -> Option<Piece> {
        match self.flag() {
            MoveFlag::PromoteToQueen => Some(Piece::Queen),
            MoveFlag::PromoteToKnight => Some(Piece::Knight),
            MoveFlag::PromoteToRook => Some(Piece::Rook),
            MoveFlag::PromoteToBishop => Some(Piece::Bishop),
            _ => None,
        }
    }

    /// Convert into the representation used by the move generator.
    pub fn to_chess_move(self) -> ChessMove {
        ChessMove::new(self.start(), self.target(), self.promotion_piece())
    }

    /// Return the UCI string representation (`0000` for the null move).
    pub fn to_uci(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return write!(f, "0000");
        }
        write!(f, "{}{}", self.start(), self.target())?;
        match self.flag() {
            MoveFlag::PromoteToQueen => write!(f, "q")?,
            MoveFlag::PromoteToKnight => write!(f, "n")?,
            MoveFlag::PromoteToRook => write!(f, "r")?,
            MoveFlag::PromoteToBishop => write!(f, "b")?,
            _ => {}
        }
        Ok(())
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Move({} flag={:?})", self, self.flag())
    }
}
