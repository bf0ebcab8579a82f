use crate::node::Outcome;
use crate::params::{Reporting, SearchLimits, SearchParameters};
use crate::search::{classify, Searcher};
use tempest_core::Board;

fn silent_params() -> SearchParameters {
    SearchParameters::silent(Vec::new())
}

fn searcher_for(fen: &str, hash_mb: usize) -> Searcher {
    let mut searcher = Searcher::new(hash_mb);
    searcher.set_position(Board::from_fen(fen).unwrap());
    searcher
}

#[test]
fn startpos_search_returns_a_legal_move_and_visits_every_child() {
    let mut searcher = Searcher::new(16);
    searcher.set_position(Board::startpos());
    let best = searcher.search(&silent_params(), &SearchLimits::nodes(20_000));
    assert!(Board::startpos().find_move(&best.to_string()).is_some());
    assert!(searcher.nodes_searched() >= 20_000);

    let children = searcher.root_children();
    assert_eq!(children.len(), 20);
    for (mv, visits) in children {
        assert!(visits > 0, "{mv} never explored");
    }
}

#[test]
fn search_respects_the_node_limit_closely() {
    let mut searcher = Searcher::new(16);
    searcher.set_position(Board::startpos());
    searcher.search(&silent_params(), &SearchLimits::nodes(2_000));
    let nodes = searcher.nodes_searched();
    assert!(nodes >= 2_000 && nodes < 4_000, "nodes {nodes}");
}

#[test]
fn mate_in_one_is_proven_and_played() {
    // Scholar's mate is on the board.
    let mut searcher =
        searcher_for("r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4", 16);
    let best = searcher.search(&silent_params(), &SearchLimits::nodes(30_000));
    assert_eq!(best.to_string(), "h5f7");
    let state = searcher.root_state();
    assert_eq!(state.outcome(), Outcome::Win);
    assert_eq!(state.distance(), 1);
}

#[test]
fn mate_flag_stops_as_soon_as_the_root_is_proven() {
    let mut searcher =
        searcher_for("r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4", 16);
    let mut limits = SearchLimits::none();
    limits.mate = true;
    let best = searcher.search(&silent_params(), &limits);
    assert_eq!(best.to_string(), "h5f7");
    assert!(searcher.root_state().is_terminal());
}

#[test]
fn stalemate_root_is_a_draw_and_does_not_crash_selection() {
    let mut searcher = searcher_for("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1", 16);
    let best = searcher.search(&silent_params(), &SearchLimits::nodes(500));
    assert!(best.is_null());
    assert_eq!(searcher.root_state().outcome(), Outcome::Draw);
    assert!((searcher.root_q() - 0.0).abs() < 1e-6);
}

#[test]
fn mated_root_reports_a_loss() {
    // Black is already checkmated; searching from the mated side.
    let mut searcher = searcher_for("R5k1/5ppp/8/8/8/8/8/4K3 b - - 0 1", 16);
    searcher.search(&silent_params(), &SearchLimits::nodes(100));
    assert_eq!(searcher.root_state().outcome(), Outcome::Loss);
}

#[test]
fn forced_mate_in_two_is_proven() {
    // Kb6 (only reply Kb8), then Rg8#.
    let mut searcher = searcher_for("k7/6R1/2K5/8/8/8/8/8 w - - 0 1", 64);
    searcher.search(&silent_params(), &SearchLimits::nodes(100_000));
    let state = searcher.root_state();
    assert_eq!(state.outcome(), Outcome::Win);
    assert!(state.distance() % 2 == 1, "mate distance must be odd for the winner");
    assert!(state.distance() <= 9, "distance {}", state.distance());
    let best = searcher.best_move();
    let board = Board::from_fen("k7/6R1/2K5/8/8/8/8/8 w - - 0 1").unwrap();
    assert!(board.find_move(&best.to_string()).is_some());
}

#[test]
fn tiny_tree_forces_half_switches_without_crashing() {
    // 1 MB leaves a half of only a few thousand nodes.
    let mut searcher = Searcher::new(1);
    searcher.set_position(Board::startpos());
    let best = searcher.search(&silent_params(), &SearchLimits::nodes(100_000));
    assert!(searcher.half_switches() > 0, "expected at least one half swap");
    assert!(Board::startpos().find_move(&best.to_string()).is_some());
}

#[test]
fn q_values_stay_in_range_through_a_long_search() {
    let mut searcher = Searcher::new(8);
    searcher.set_position(Board::kiwipete());
    searcher.search(&silent_params(), &SearchLimits::nodes(30_000));
    let q = searcher.root_q();
    assert!((-1.0..=1.0).contains(&q), "root q {q}");
    for (mv, visits) in searcher.root_children() {
        assert!(Board::kiwipete().find_move(&mv.to_string()).is_some());
        assert!(visits <= searcher.nodes_searched());
    }
}

#[test]
fn repetition_inside_the_search_is_scored_as_a_draw() {
    // KQ-KQ shuffle: with the pre-root history containing the root twice,
    // the root itself is classified as a threefold draw.
    let board = Board::from_fen("3qk3/8/8/8/8/8/8/3QK3 w - - 0 1").unwrap();
    let history = vec![board.zobrist(), 12345, board.zobrist(), 678910];
    let mut searcher = Searcher::new(16);
    searcher.set_position(board);
    let params = SearchParameters::silent(history);
    searcher.search(&params, &SearchLimits::nodes(200));
    assert_eq!(searcher.root_state().outcome(), Outcome::Draw);
}

#[test]
fn classify_matches_the_oracle_predicates() {
    let stalemate = Board::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
    assert_eq!(classify(&stalemate, &[]).outcome(), Outcome::Draw);

    let mate = Board::from_fen("R5k1/5ppp/8/8/8/8/8/4K3 b - - 0 1").unwrap();
    assert_eq!(classify(&mate, &[]).outcome(), Outcome::Loss);
    assert_eq!(classify(&mate, &[]).distance(), 0);

    let ongoing = Board::startpos();
    assert_eq!(classify(&ongoing, &[]).outcome(), Outcome::Ongoing);
}

#[test]
fn search_is_deterministic_for_a_fixed_budget() {
    let run = || {
        let mut searcher = Searcher::new(16);
        searcher.set_position(Board::kiwipete());
        let best = searcher.search(&silent_params(), &SearchLimits::nodes(5_000));
        (best, searcher.nodes_searched(), searcher.root_q())
    };
    assert_eq!(run(), run());
}

#[test]
fn tree_reuse_promotes_the_played_line() {
    let mut searcher = Searcher::new(16);
    let board = Board::startpos();
    searcher.set_position(board);
    searcher.search(&silent_params(), &SearchLimits::nodes(10_000));

    // Play two plies and search again: the grandchild subtree should seed
    // the new root with visits instead of starting cold.
    let mut next = board;
    next.make_move(board.find_move("e2e4").unwrap());
    let reply = next.find_move("e7e5").unwrap();
    next.make_move(reply);
    searcher.set_position(next);
    searcher.search(&silent_params(), &SearchLimits::nodes(1_000));
    assert!(searcher.nodes_searched() >= 1_000);
    let q = searcher.root_q();
    assert!((-1.0..=1.0).contains(&q));
}

#[test]
fn stop_flag_interrupts_an_unbounded_search() {
    use std::thread;
    use std::time::Duration;

    let mut searcher = Searcher::new(16);
    searcher.set_position(Board::startpos());
    let stop = searcher.stop_handle();

    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        stop.store(true, std::sync::atomic::Ordering::Relaxed);
    });

    let start = std::time::Instant::now();
    searcher.search(&silent_params(), &SearchLimits::none());
    assert!(start.elapsed() < Duration::from_secs(5));
    handle.join().unwrap();
}

#[test]
fn wall_clock_budget_is_respected() {
    let mut searcher = Searcher::new(16);
    searcher.set_position(Board::startpos());
    let mut limits = SearchLimits::none();
    limits.time = 100;
    let start = std::time::Instant::now();
    searcher.search(&silent_params(), &limits);
    assert!(start.elapsed().as_millis() <= 250, "took {:?}", start.elapsed());
}

#[test]
fn minimal_reporting_mode_produces_a_move() {
    let mut searcher = Searcher::new(16);
    searcher.set_position(Board::startpos());
    let mut params = silent_params();
    params.reporting = Reporting::UciMinimal;
    let best = searcher.search(&params, &SearchLimits::nodes(500));
    assert!(Board::startpos().find_move(&best.to_string()).is_some());
}

#[test]
fn policy_and_value_modes_return_legal_moves() {
    let mut searcher = Searcher::new(16);
    searcher.set_position(Board::kiwipete());
    let p = searcher.search_policy(false);
    let v = searcher.search_value(false);
    assert!(Board::kiwipete().find_move(&p.to_string()).is_some());
    assert!(Board::kiwipete().find_move(&v.to_string()).is_some());
}

#[test]
fn render_root_lists_every_child() {
    let mut searcher = Searcher::new(16);
    searcher.set_position(Board::startpos());
    searcher.search(&silent_params(), &SearchLimits::nodes(2_000));
    let table = searcher.render_root();
    assert!(table.contains("root:"));
    for (mv, _) in searcher.root_children() {
        assert!(table.contains(&mv.to_string()), "{mv} missing from table");
    }
}
