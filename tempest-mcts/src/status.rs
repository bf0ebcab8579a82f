//! Snapshot of a running search, published for render threads.
//!
//! The searcher is single-threaded; anything that wants to draw progress
//! (the TUI, the datagen monitor) reads a copied snapshot behind a mutex
//! instead of peeking at live tree state.

use tempest_core::Move;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScoreView {
    Cp(i32),
    /// Moves (not plies) to mate; negative when the engine is getting mated.
    Mate(i32),
}

impl Default for ScoreView {
    fn default() -> Self {
        ScoreView::Cp(0)
    }
}

#[derive(Clone, Default)]
pub struct SearchStatus {
    pub depth: u64,
    pub seldepth: u64,
    pub nodes: u64,
    pub nps: u64,
    pub elapsed_ms: u64,
    pub score: ScoreView,
    pub best_move: Move,
    pub pv: Vec<Move>,
    /// Permil occupancy of the active tree half.
    pub hashfull: u64,
    /// Leaf-cache occupancy in [0, 1].
    pub cache_full: f32,
    pub half_switches: u64,
    pub finished: bool,
}
