//! tempest-mcts: PUCT tree search for the Tempest chess engine.
//!
//! The tree lives in two fixed-size arena halves; node statistics are
//! quantised; the search is strictly single-threaded and communicates
//! with render threads through copied [`SearchStatus`] snapshots.

pub mod cache;
pub mod history;
pub mod node;
pub mod params;
pub mod priors;
pub mod search;
#[cfg(test)]
mod search_tests;
pub mod status;
pub mod tree;

pub use cache::{CacheEntry, LeafCache};
pub use history::ButterflyHistory;
pub use node::{GameState, Node, NodeIndex, Outcome};
pub use params::{Reporting, SearchLimits, SearchParameters};
pub use priors::fill_policy;
pub use search::{classify, Searcher};
pub use status::{ScoreView, SearchStatus};
pub use tree::{Tree, DEFAULT_HASH_MB};

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
