//! Fixed-budget benchmark over a built-in FEN suite. Deterministic for a
//! given build, so the printed signature doubles as a change detector.

use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};
use std::time::Instant;
use tempest_core::Board;
use tempest_mcts::{SearchLimits, SearchParameters, Searcher};

pub const BENCH_HASH_MB: usize = 32;
pub const BENCH_NODES_PER_DEPTH: u64 = 4_096;

const BENCH_FENS: [&str; 10] = [
    tempest_core::STARTPOS_FEN,
    tempest_core::KIWIPETE_FEN,
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
    "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
    "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
    "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
    "4k3/8/8/8/8/8/4K3/R7 w - - 0 1",
    "8/8/8/8/8/4k3/4p3/4K3 b - - 0 1",
    "r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4",
    "rnbqkb1r/pp2pppp/3p1n2/8/3NP3/2N5/PPP2PPP/R1BQKB1R b KQkq - 0 5",
];

/// Search every suite position for `depth * 4096` nodes; print per-position
/// best moves, the total node count, throughput and a signature hash.
pub fn run(depth: u64) {
    let node_budget = depth.max(1) * BENCH_NODES_PER_DEPTH;
    let mut searcher = Searcher::new(BENCH_HASH_MB);
    let mut hasher = FxHasher::default();
    let mut total_nodes = 0u64;
    let started = Instant::now();

    for (i, fen) in BENCH_FENS.iter().enumerate() {
        let board = match Board::from_fen(fen) {
            Ok(b) => b,
            Err(e) => {
                eprintln!("bench position {i} rejected: {e}");
                continue;
            }
        };
        searcher.new_game();
        searcher.set_position(board);
        let best = searcher.search(
            &SearchParameters::silent(Vec::new()),
            &SearchLimits::nodes(node_budget),
        );
        println!(
            "position {:>2}: bestmove {:>5}  nodes {:>9}",
            i + 1,
            best.to_string(),
            searcher.nodes_searched()
        );
        total_nodes += searcher.nodes_searched();
        best.to_string().hash(&mut hasher);
        searcher.nodes_searched().hash(&mut hasher);
    }

    let elapsed = started.elapsed().as_secs_f64().max(1e-9);
    println!();
    println!("{total_nodes} nodes {} nps", (total_nodes as f64 / elapsed) as u64);
    println!("signature: {:016x}", hasher.finish());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_bench_fen_parses() {
        for fen in BENCH_FENS {
            assert!(Board::from_fen(fen).is_ok(), "bad bench FEN {fen}");
        }
    }
}
