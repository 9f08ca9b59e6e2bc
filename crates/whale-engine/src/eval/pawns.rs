//! Passed and isolated pawn evaluation.

use whale_core::{Board, Color, Piece};

const FILE_A: u64 = 0x0101_0101_0101_0101;

/// For each file index 0–7, the bitboard of the adjacent files.
pub(crate) static ADJACENT_FILES: [u64; 8] = compute_adjacent_files();

/// For each `[color][square]`, the squares ahead of the pawn on its own and
/// adjacent files. A pawn is passed if no enemy pawn stands in this mask.
pub(crate) static PASSED_PAWN_MASK: [[u64; 64]; 2] = compute_passed_pawn_masks();

/// Bonus for a passed pawn by the number of squares left to promotion.
const PASSED_PAWN_BONUS: [i32; 7] = [0, 120, 80, 50, 30, 15, 15];

/// Penalty by the total number of isolated pawns a side has.
const ISOLATED_PAWN_PENALTY_BY_COUNT: [i32; 9] = [0, -10, -25, -50, -75, -75, -75, -75, -75];

const fn compute_adjacent_files() -> [u64; 8] {
    let mut table = [0u64; 8];
    let mut f = 0;
    while f < 8 {
        if f > 0 {
            table[f] |= FILE_A << (f - 1);
        }
        if f < 7 {
            table[f] |= FILE_A << (f + 1);
        }
        f += 1;
    }
    table
}

const fn compute_passed_pawn_masks() -> [[u64; 64]; 2] {
    let mut table = [[0u64; 64]; 2];
    let mut sq = 0;
    while sq < 64 {
        let rank = sq / 8;
        let file = sq % 8;
        let span = (FILE_A << file) | compute_adjacent_files()[file];

        // Ranks strictly above (White) or below (Black) the pawn.
        let white_forward = if rank == 7 { 0 } else { !0u64 << (8 * (rank + 1)) };
        let black_forward = (1u64 << (8 * rank)) - 1;

        table[0][sq] = span & white_forward;
        table[1][sq] = span & black_forward;
        sq += 1;
    }
    table
}

/// Pawn structure score for `color`: passed pawn bonuses plus the isolated
/// pawn penalty.
pub fn evaluate_pawns(board: &Board, color: Color) -> i32 {
    let pawns = *board.pieces(Piece::Pawn);
    let friendly = (pawns & *board.color_combined(color)).0;
    let enemy = (pawns & *board.color_combined(!color)).0;
    let masks = &PASSED_PAWN_MASK[color.to_index()];

    let mut bonus = 0;
    let mut isolated = 0;
    let mut remaining = friendly;
    while remaining != 0 {
        let sq = remaining.trailing_zeros() as usize;
        remaining &= remaining - 1;

        if enemy & masks[sq] == 0 {
            let rank = sq / 8;
            let squares_from_promotion = if color == Color::White { 7 - rank } else { rank };
            bonus += PASSED_PAWN_BONUS[squares_from_promotion.min(6)];
        }
        if friendly & ADJACENT_FILES[sq % 8] == 0 {
            isolated += 1;
        }
    }

    bonus + ISOLATED_PAWN_PENALTY_BY_COUNT[isolated.min(8)]
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn adjacent_files_edges() {
        assert_eq!(ADJACENT_FILES[0], FILE_A << 1);
        assert_eq!(ADJACENT_FILES[7], FILE_A << 6);
        assert_eq!(ADJACENT_FILES[3], (FILE_A << 2) | (FILE_A << 4));
    }

    #[test]
    fn passed_mask_e4() {
        let e4 = 28;
        let white = PASSED_PAWN_MASK[0][e4];
        // d5-f8 block: 3 files × 4 ranks.
        assert_eq!(white.count_ones(), 12);
        assert_eq!(white & 0xFFFF_FFFF, 0);
        let black = PASSED_PAWN_MASK[1][e4];
        assert_eq!(black.count_ones(), 9);
    }

    #[test]
    fn starting_position_has_no_pawn_terms() {
        let board = Board::default();
        assert_eq!(evaluate_pawns(&board, Color::White), 0);
        assert_eq!(evaluate_pawns(&board, Color::Black), 0);
    }

    #[test]
    fn lone_passed_isolated_pawn() {
        // White pawn on e6: passed (2 squares to go) and isolated.
        let board = Board::from_str("4k3/8/4P3/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(evaluate_pawns(&board, Color::White), 80 - 10);
    }

    #[test]
    fn blocked_pawn_is_not_passed() {
        let board = Board::from_str("4k3/3p4/8/4P3/8/8/8/4K3 w - - 0 1").unwrap();
        // e5 and d7 sit on adjacent files, so neither is passed; both are isolated.
        assert_eq!(evaluate_pawns(&board, Color::White), -10);
        assert_eq!(evaluate_pawns(&board, Color::Black), -10);
    }
}
