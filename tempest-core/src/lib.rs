//! tempest-core: board representation, legal move generation and the
//! oracle predicates (draw, game-over, check) the search relies on.

pub mod attacks;
pub mod bitboard;
pub mod board;
pub mod movegen;
pub mod perft;
pub mod types;

pub use bitboard::Bitboard;
pub use board::{Board, FenError, KIWIPETE_FEN, STARTPOS_FEN};
pub use movegen::{MoveList, MAX_MOVES};
pub use types::{CastlingRights, Color, Move, MoveKind, Piece, Square};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_nonempty() {
        assert!(!VERSION.is_empty());
    }
}
