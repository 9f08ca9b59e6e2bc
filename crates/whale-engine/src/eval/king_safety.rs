//! King attack evaluation.
//!
//! Each minor piece, rook, or queen whose attacks reach the enemy king zone
//! contributes attack units; the unit total is mapped through a saturating
//! table so that coordinated attacks score far more than lone attackers.

use whale_core::{Board, Color, Piece, piece_attacks};

/// `[color][king square]` zone around a king of that colour: its own rank,
/// one rank behind, and four ranks in front, over the king's file and its
/// neighbours.
pub(crate) static KING_SAFETY_MASK: [[u64; 64]; 2] = compute_king_safety_masks();

#[rustfmt::skip]
const SAFETY_TABLE: [i32; 100] = [
      0,   0,   1,   2,   3,   5,   7,   9,  12,  15,
     18,  22,  26,  30,  35,  39,  44,  50,  56,  62,
     68,  75,  82,  85,  89,  97, 105, 113, 122, 131,
    140, 150, 169, 180, 191, 202, 213, 225, 237, 248,
    260, 272, 283, 295, 307, 319, 330, 342, 354, 366,
    377, 389, 401, 412, 424, 436, 448, 459, 471, 483,
    494, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
];

const MINOR_ATTACK_UNITS: usize = 2;
const ROOK_ATTACK_UNITS: usize = 3;
const QUEEN_ATTACK_UNITS: usize = 5;

const fn rank_mask(rank: isize) -> u64 {
    if rank < 0 || rank > 7 { 0 } else { 0xFFu64 << (8 * rank) }
}

const fn compute_king_safety_masks() -> [[u64; 64]; 2] {
    const FILE_A: u64 = 0x0101_0101_0101_0101;
    let mut table = [[0u64; 64]; 2];
    let mut sq = 0;
    while sq < 64 {
        let rank = (sq / 8) as isize;
        let file = sq % 8;
        let left = if file > 0 { file - 1 } else { 0 };
        let right = if file < 7 { file + 1 } else { 7 };
        let files = (FILE_A << file) | (FILE_A << left) | (FILE_A << right);

        let mut white_ranks = rank_mask(rank - 1) | rank_mask(rank);
        let mut black_ranks = rank_mask(rank + 1) | rank_mask(rank);
        let mut step = 1;
        while step <= 4 {
            white_ranks |= rank_mask(rank + step);
            black_ranks |= rank_mask(rank - step);
            step += 1;
        }

        table[0][sq] = white_ranks & files;
        table[1][sq] = black_ranks & files;
        sq += 1;
    }
    table
}

/// Attack bonus for `attacker` against the opposing king.
pub fn evaluate_king_attack(board: &Board, attacker: Color) -> i32 {
    let defender = !attacker;
    let zone = KING_SAFETY_MASK[defender.to_index()][board.king_square(defender).to_index()];
    let occupied = *board.combined();
    let own = *board.color_combined(attacker);

    let mut units = 0;
    for (piece, per_hit) in [
        (Piece::Knight, MINOR_ATTACK_UNITS),
        (Piece::Bishop, MINOR_ATTACK_UNITS),
        (Piece::Rook, ROOK_ATTACK_UNITS),
        (Piece::Queen, QUEEN_ATTACK_UNITS),
    ] {
        for sq in *board.pieces(piece) & own {
            if piece_attacks(piece, attacker, sq.to_index(), occupied).0 & zone != 0 {
                units += per_hit;
            }
        }
    }

    SAFETY_TABLE[units.min(SAFETY_TABLE.len() - 1)]
}
