//! Policy head: `i8` weights, CReLU hidden layer, one output slot per
//! `(from, to)` move pair plus a fixed promotion block.

use crate::feature::{for_each_feature, FEATURES};
use std::sync::OnceLock;
use tempest_core::{attacks, Bitboard, Board, Color, Move, Piece, Square};

pub const Q_P: i32 = 128;
pub const HIDDEN: usize = 64;

/// Slots for all `(from, to)` pairs reachable on an empty board.
pub const SQUARE_SLOTS: usize = 1792;
/// 22 promotion source/destination file pairs, four promotion kinds.
pub const PROMO_SLOTS: usize = 88;
pub const POLICY_OUTPUTS: usize = SQUARE_SLOTS + PROMO_SLOTS;

const PROMO_STRIDE: usize = 22;

const BLOB_LEN: usize = FEATURES * HIDDEN + HIDDEN + POLICY_OUTPUTS * HIDDEN + POLICY_OUTPUTS;

#[repr(C, align(32))]
struct AlignedBlob<const N: usize>([u8; N]);

static BLOB: AlignedBlob<BLOB_LEN> = AlignedBlob(*include_bytes!("../networks/policy.bin"));

struct PolicyNet {
    l1_weights: &'static [i8], // [feature][hidden]
    l1_bias: &'static [i8],
    out_weights: &'static [i8], // [slot][hidden]
    out_bias: &'static [i8],
}

fn net() -> PolicyNet {
    let all: &'static [i8] = bytemuck::cast_slice(&BLOB.0);
    let (l1_weights, rest) = all.split_at(FEATURES * HIDDEN);
    let (l1_bias, rest) = rest.split_at(HIDDEN);
    let (out_weights, out_bias) = rest.split_at(POLICY_OUTPUTS * HIDDEN);
    PolicyNet {
        l1_weights,
        l1_bias,
        out_weights,
        out_bias,
    }
}

struct SlotTables {
    destinations: [Bitboard; 64],
    offsets: [usize; 65],
}

static SLOTS: OnceLock<SlotTables> = OnceLock::new();

fn slots() -> &'static SlotTables {
    SLOTS.get_or_init(|| {
        attacks::init();
        let mut destinations = [Bitboard::EMPTY; 64];
        let mut offsets = [0usize; 65];
        let mut total = 0;
        for s in 0..64usize {
            let sq = Square(s as u8);
            destinations[s] = attacks::rook_attacks(sq, Bitboard::EMPTY)
                | attacks::bishop_attacks(sq, Bitboard::EMPTY)
                | attacks::knight_attacks(sq)
                | attacks::king_attacks(sq);
            offsets[s] = total;
            total += destinations[s].count() as usize;
        }
        offsets[64] = total;
        SlotTables {
            destinations,
            offsets,
        }
    })
}

/// Empty-board destination set per source square.
pub fn policy_destinations(sq: Square) -> Bitboard {
    slots().destinations[sq.index()]
}

/// Prefix sums over destination counts; `policy_offsets()[64]` is the
/// first promotion slot.
pub fn policy_offsets() -> &'static [usize; 65] {
    &slots().offsets
}

/// Output slot of a move, from the mover's perspective.
///
/// Bijective over the legal moves of any one position: non-promotions map
/// through the flipped `(from, to)` pair, promotions through their file
/// pair and promotion kind.
pub fn move_slot(stm: Color, mv: Move) -> usize {
    let t = slots();
    if mv.is_promotion() {
        let kind = match mv.promo_piece() {
            Piece::Knight => 0,
            Piece::Bishop => 1,
            Piece::Rook => 2,
            _ => 3,
        };
        let pair = 2 * mv.from().file() as usize + mv.to().file() as usize;
        return t.offsets[64] + kind * PROMO_STRIDE + pair;
    }

    let flipper = if stm == Color::Black { 56 } else { 0 };
    let from = Square(mv.from().0 ^ flipper);
    let to = mv.to().0 ^ flipper;
    let all = t.destinations[from.index()];
    let below = all.0 & ((1u64 << to) - 1);
    t.offsets[from.index()] + below.count_ones() as usize
}

/// Hidden-layer activations for one position, shared by every move scored
/// from it.
pub struct PolicyAccumulator {
    hidden: [i16; HIDDEN],
}

impl PolicyAccumulator {
    pub fn new(board: &Board) -> Self {
        let nn = net();
        let mut hidden = [0i16; HIDDEN];
        for (h, &b) in hidden.iter_mut().zip(nn.l1_bias) {
            *h = b as i16;
        }
        for_each_feature(board, |feature| {
            let row = &nn.l1_weights[feature * HIDDEN..(feature + 1) * HIDDEN];
            for (h, &w) in hidden.iter_mut().zip(row) {
                *h = h.wrapping_add(w as i16);
            }
        });
        // CReLU up front; the output layer is a plain dot product.
        for h in &mut hidden {
            *h = (*h).clamp(0, Q_P as i16);
        }
        Self { hidden }
    }

    /// Raw logit of `mv` for the side to move.
    pub fn logit(&self, stm: Color, mv: Move) -> f32 {
        let nn = net();
        let slot = move_slot(stm, mv);
        let row = &nn.out_weights[slot * HIDDEN..(slot + 1) * HIDDEN];
        let mut sum = nn.out_bias[slot] as i32;
        for (&h, &w) in self.hidden.iter().zip(row) {
            sum += h as i32 * w as i32;
        }
        sum as f32 / (Q_P * Q_P) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempest_core::perft::perft;

    #[test]
    fn offset_table_matches_the_layout() {
        let offsets = policy_offsets();
        assert_eq!(offsets[64], SQUARE_SLOTS);
        assert_eq!(offsets[64] + PROMO_SLOTS, POLICY_OUTPUTS);
        // Corner square: 14 rook + 7 bishop + 2 knight destinations (the
        // king's are all covered by the sliders).
        assert_eq!(policy_destinations(Square::A1).count(), 23);
    }

    #[test]
    fn promotion_slots_use_the_fixed_block() {
        let mv = Move::promotion(Square::parse("a7").unwrap(), Square::parse("a8").unwrap(), Piece::Knight);
        assert_eq!(move_slot(Color::White, mv), SQUARE_SLOTS);
        let mv = Move::promotion(Square::parse("h2").unwrap(), Square::parse("g1").unwrap(), Piece::Queen);
        assert_eq!(
            move_slot(Color::Black, mv),
            SQUARE_SLOTS + 3 * 22 + 2 * 7 + 6
        );
    }

    #[test]
    fn slots_are_injective_over_reachable_positions() {
        fn walk(board: &Board, depth: u32) {
            let moves = board.legal_moves();
            let mut seen = vec![false; POLICY_OUTPUTS];
            for mv in moves.iter() {
                let slot = move_slot(board.stm(), mv);
                assert!(slot < POLICY_OUTPUTS, "slot {slot} for {mv}");
                assert!(!seen[slot], "slot collision for {mv} in {}", board.to_fen());
                seen[slot] = true;
            }
            if depth > 0 {
                for mv in moves.iter() {
                    walk(&board.child(mv), depth - 1);
                }
            }
        }

        walk(&Board::startpos(), 2);
        walk(&Board::kiwipete(), 1);
        walk(
            &Board::from_fen("r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1")
                .unwrap(),
            1,
        );
        // Sanity that the walk covered real ground.
        assert!(perft(&Board::startpos(), 2) == 400);
    }

    #[test]
    fn black_moves_are_rank_flipped() {
        let white = Move::new(Square::parse("e2").unwrap(), Square::parse("e4").unwrap());
        let black = Move::new(Square::parse("e7").unwrap(), Square::parse("e5").unwrap());
        assert_eq!(move_slot(Color::White, white), move_slot(Color::Black, black));
    }

    #[test]
    fn logits_are_finite_and_deterministic() {
        let board = Board::startpos();
        let acc = PolicyAccumulator::new(&board);
        for mv in board.legal_moves().iter() {
            let a = acc.logit(board.stm(), mv);
            let b = acc.logit(board.stm(), mv);
            assert!(a.is_finite());
            assert_eq!(a, b);
        }
    }
}
