//! Mop-up term: drive a losing king to the edge once the material edge is decisive.

use whale_core::{Board, Color};

use crate::eval::material::{MaterialInfo, PAWN_VALUE};

/// Manhattan distance between two square indices.
pub fn orthogonal_distance(a: usize, b: usize) -> i32 {
    let file = (a % 8).abs_diff(b % 8);
    let rank = (a / 8).abs_diff(b / 8);
    (file + rank) as i32
}

/// Manhattan distance from `sq` to the nearest of the four centre squares.
pub fn centre_manhattan_distance(sq: usize) -> i32 {
    let file = (sq % 8) as i32;
    let rank = (sq / 8) as i32;
    (3 - file).max(file - 4) + (3 - rank).max(rank - 4)
}

/// Mop-up bonus for `color`. Zero unless `color` is more than two pawns ahead
/// and the opponent has started trading into an endgame.
pub fn mop_up(board: &Board, color: Color, mine: &MaterialInfo, enemy: &MaterialInfo) -> i32 {
    if mine.material_score <= enemy.material_score + PAWN_VALUE * 2 || enemy.endgame_t <= 0.0 {
        return 0;
    }
    let own_king = board.king_square(color).to_index();
    let enemy_king = board.king_square(!color).to_index();
    let score = (14 - orthogonal_distance(own_king, enemy_king)) * 4
        + centre_manhattan_distance(enemy_king) * 10;
    (score as f32 * enemy.endgame_t) as i32
}
