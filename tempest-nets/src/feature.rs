//! Shared 768-feature input encoding.

use tempest_core::{Board, Color, Piece, Square};

pub const FEATURES: usize = 768;

/// Feature index for one occupied square, relative to the side to move:
/// friendly pieces first, then enemy pieces, board flipped vertically when
/// black is to move.
#[inline]
pub fn feature_index(stm: Color, piece_color: Color, piece: Piece, sq: Square) -> usize {
    let enemy = (stm != piece_color) as usize;
    let sq = if stm == Color::Black { sq.flip_rank() } else { sq };
    enemy * 384 + piece.index() * 64 + sq.index()
}

/// Visit every `(feature index)` of the position exactly once.
#[inline]
pub fn for_each_feature(board: &Board, mut f: impl FnMut(usize)) {
    let stm = board.stm();
    for color in [Color::White, Color::Black] {
        for piece in Piece::ALL {
            for sq in board.pieces(color, piece) {
                f(feature_index(stm, color, piece, sq));
            }
        }
    }
}
