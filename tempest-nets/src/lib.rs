//! tempest-nets: the two quantised networks embedded in the binary.
//!
//! The value head scores a position in centipawns, the policy head scores
//! every legal move; both read the same 768-feature board encoding
//! (side-to-move relative `(colour, piece, square)` occupancy).

#[cfg(target_endian = "big")]
compile_error!("the embedded network blobs are little-endian; big-endian hosts are unsupported");

pub mod policy;
pub mod value;

mod feature;

pub use policy::{
    move_slot, policy_destinations, policy_offsets, PolicyAccumulator, POLICY_OUTPUTS,
    PROMO_SLOTS, SQUARE_SLOTS,
};
pub use value::{cp_to_wdl, evaluate, wdl_to_cp, EVAL_DIVISOR};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
