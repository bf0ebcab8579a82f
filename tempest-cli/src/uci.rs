//! The line-oriented UCI command loop.
//!
//! `go` runs the search on a worker thread so `stop` stays responsive;
//! everything else executes inline.

use crate::options::{EngineOptions, SearchMode};
use std::io::BufRead;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;
use tempest_core::perft::{perft_bulk, perft_divide, perft_suite};
use tempest_core::{Board, Move};
use tempest_logging::{now_ms, NdjsonWriter, SearchSummaryV1};
use tempest_mcts::{Reporting, ScoreView, SearchLimits, SearchParameters, SearchStatus, Searcher};
use tempest_nets::{cp_to_wdl, evaluate, PolicyAccumulator};

pub struct UciSession {
    board: Board,
    pos_history: Vec<u64>,
    options: EngineOptions,
    searcher: Arc<Mutex<Searcher>>,
    stop: Arc<AtomicBool>,
    status: Arc<Mutex<SearchStatus>>,
    search_thread: Option<JoinHandle<()>>,
    /// `TEMPEST_LOG=<path>` appends one NDJSON summary per finished search.
    log_path: Option<String>,
}

impl UciSession {
    pub fn new() -> Self {
        let mut searcher = Searcher::default();
        let stop = searcher.stop_handle();
        let status = Arc::new(Mutex::new(SearchStatus::default()));
        searcher.set_status_sink(Some(Arc::clone(&status)));
        Self {
            board: Board::startpos(),
            pos_history: Vec::new(),
            options: EngineOptions::default(),
            searcher: Arc::new(Mutex::new(searcher)),
            stop,
            status,
            search_thread: None,
            log_path: std::env::var("TEMPEST_LOG").ok(),
        }
    }

    pub fn run_loop(&mut self) {
        println!("Tempest {} ready and awaiting commands", env!("CARGO_PKG_VERSION"));
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let received = Instant::now();
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if !self.handle_line(line, received) {
                break;
            }
        }
        self.stop.store(true, Ordering::Relaxed);
        self.join_search();
    }

    /// Returns `false` on `quit`.
    fn handle_line(&mut self, line: &str, received: Instant) -> bool {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens[0] {
            "uci" => {
                println!("id name Tempest {}", env!("CARGO_PKG_VERSION"));
                println!("id author the Tempest authors");
                self.options.print_uci_block();
                println!("uciok");
            }
            "isready" => println!("readyok"),
            "ucinewgame" => {
                self.join_search();
                self.board = Board::startpos();
                self.pos_history.clear();
                if let Ok(mut searcher) = self.searcher.lock() {
                    searcher.new_game();
                }
            }
            "position" => self.cmd_position(&tokens),
            "go" => self.cmd_go(&tokens, received),
            "setoption" => self.cmd_setoption(&tokens),
            "stop" => self.stop.store(true, Ordering::Relaxed),
            "quit" => return false,

            // Informational commands.
            "d" => println!("{}", self.board),
            "eval" => {
                let cp = evaluate(&self.board);
                println!("eval: {cp} cp  (wdl {:+.4})", cp_to_wdl(cp));
            }
            "policy" => self.cmd_policy(),
            "tree" => {
                self.join_search();
                if let Ok(searcher) = self.searcher.lock() {
                    print!("{}", searcher.render_root());
                }
            }
            "perft" => match tokens.get(1).and_then(|t| t.parse().ok()) {
                Some(depth) => {
                    perft_divide(&self.board, depth);
                }
                None => println!("usage: perft <depth>"),
            },
            "bulk" => match tokens.get(1).and_then(|t| t.parse().ok()) {
                Some(depth) => {
                    perft_bulk(&self.board, depth);
                }
                None => println!("usage: bulk <depth>"),
            },
            "perftsuite" => match tokens.get(1) {
                Some(path) => {
                    if let Err(e) = perft_suite(Path::new(path)) {
                        println!("perftsuite failed: {e}");
                    }
                }
                None => println!("usage: perftsuite <path>"),
            },
            "move" => match tokens.get(1) {
                Some(uci) => self.apply_move(uci),
                None => println!("usage: move <uci>"),
            },
            "tui" => self.cmd_tui(),

            _ => println!("Unknown command: {line}"),
        }
        true
    }

    fn cmd_position(&mut self, tokens: &[&str]) {
        let mut board;
        let mut rest = 2;
        match tokens.get(1) {
            Some(&"startpos") => board = Board::startpos(),
            Some(&"kiwipete") => board = Board::kiwipete(),
            Some(&"fen") => {
                let end = tokens
                    .iter()
                    .position(|&t| t == "moves")
                    .unwrap_or(tokens.len());
                let fen = tokens[2..end].join(" ");
                match Board::from_fen(&fen) {
                    Ok(b) => board = b,
                    Err(e) => {
                        println!("invalid FEN: {e}");
                        return;
                    }
                }
                rest = end;
            }
            _ => {
                println!("usage: position (startpos | kiwipete | fen <FEN>) [moves ...]");
                return;
            }
        }

        let mut history = Vec::new();
        if tokens.get(rest) == Some(&"moves") {
            for uci in &tokens[rest + 1..] {
                match board.find_move(uci) {
                    Some(mv) => {
                        history.push(board.zobrist());
                        board.make_move(mv);
                    }
                    None => {
                        println!("illegal move in position command: {uci}");
                        return;
                    }
                }
            }
        }
        self.board = board;
        self.pos_history = history;
    }

    fn cmd_go(&mut self, tokens: &[&str], received: Instant) {
        self.join_search();

        let value_after = |key: &str| -> i64 {
            tokens
                .iter()
                .position(|&t| t == key)
                .and_then(|i| tokens.get(i + 1))
                .and_then(|v| v.parse().ok())
                .unwrap_or(0)
        };

        let mut limits = SearchLimits::none();
        limits.started = received;
        limits.depth = value_after("depth").max(0) as u64;
        limits.nodes = value_after("nodes").max(0) as u64;
        limits.movetime = value_after("movetime");
        limits.mate = tokens.contains(&"mate");
        let (time, inc) = if self.board.stm() == tempest_core::Color::White {
            (value_after("wtime"), value_after("winc"))
        } else {
            (value_after("btime"), value_after("binc"))
        };
        limits.time = time;
        limits.inc = inc;

        let mut params = SearchParameters::uci(self.pos_history.clone());
        params.multipv = self.options.multipv;
        params.reporting = if self.options.minimal {
            Reporting::UciMinimal
        } else {
            Reporting::Uci
        };

        self.stop.store(false, Ordering::Relaxed);

        match self.options.search_mode {
            SearchMode::Full => {
                let searcher = Arc::clone(&self.searcher);
                let status = Arc::clone(&self.status);
                let log_path = self.log_path.clone();
                let board = self.board;
                self.search_thread = Some(std::thread::spawn(move || {
                    let Ok(mut searcher) = searcher.lock() else {
                        return;
                    };
                    searcher.set_position(board);
                    searcher.search(&params, &limits);
                    if let Some(path) = log_path {
                        log_summary(&path, &board, &status);
                    }
                }));
            }
            SearchMode::Policy => {
                if let Ok(mut searcher) = self.searcher.lock() {
                    searcher.set_position(self.board);
                    searcher.search_policy(true);
                }
            }
            SearchMode::Value => {
                if let Ok(mut searcher) = self.searcher.lock() {
                    searcher.set_position(self.board);
                    searcher.search_value(true);
                }
            }
        }
    }

    fn cmd_setoption(&mut self, tokens: &[&str]) {
        // setoption name <N...> value <V...>
        let name_at = tokens.iter().position(|&t| t == "name");
        let value_at = tokens.iter().position(|&t| t == "value");
        let (Some(name_at), Some(value_at)) = (name_at, value_at) else {
            println!("usage: setoption name <name> value <value>");
            return;
        };
        if value_at <= name_at {
            println!("usage: setoption name <name> value <value>");
            return;
        }
        let name = tokens[name_at + 1..value_at].join(" ");
        let value = tokens[value_at + 1..].join(" ");

        match self.options.set(&name, &value) {
            Ok(()) => {
                if name == "Hash" {
                    self.join_search();
                    if let Ok(mut searcher) = self.searcher.lock() {
                        searcher.set_hash(self.options.hash_mb);
                    }
                }
            }
            Err(msg) => println!("setoption rejected: {msg}"),
        }
    }

    fn cmd_policy(&self) {
        let moves = self.board.legal_moves();
        if moves.is_empty() {
            println!("no legal moves");
            return;
        }
        let accumulator = PolicyAccumulator::new(&self.board);
        let logits: Vec<(Move, f32)> = moves
            .iter()
            .map(|mv| (mv, accumulator.logit(self.board.stm(), mv)))
            .collect();

        let max = logits.iter().map(|&(_, l)| l).fold(f32::NEG_INFINITY, f32::max);
        let sum: f32 = logits.iter().map(|&(_, l)| (l - max).exp()).sum();

        let mut scored: Vec<(Move, f32, f32)> = logits
            .into_iter()
            .map(|(mv, l)| (mv, l, (l - max).exp() / sum))
            .collect();
        scored.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

        for (mv, logit, p) in scored {
            println!("{:>5}: {:>6.2}%  (logit {logit:+.3})", mv.to_string(), p * 100.0);
        }
    }

    fn apply_move(&mut self, uci: &str) {
        match self.board.find_move(uci) {
            Some(mv) => {
                self.pos_history.push(self.board.zobrist());
                self.board.make_move(mv);
            }
            None => println!("illegal move: {uci}"),
        }
    }

    fn cmd_tui(&mut self) {
        self.join_search();
        if let Ok(mut snapshot) = self.status.lock() {
            *snapshot = SearchStatus::default();
        }

        self.stop.store(false, Ordering::Relaxed);
        let searcher = Arc::clone(&self.searcher);
        let board = self.board;
        let history = self.pos_history.clone();
        let handle = std::thread::spawn(move || {
            let Ok(mut searcher) = searcher.lock() else {
                return;
            };
            searcher.set_position(board);
            searcher.search(&SearchParameters::silent(history), &SearchLimits::none());
        });

        let view = tempest_tui::run(self.board, Arc::clone(&self.status), Arc::clone(&self.stop));
        self.stop.store(true, Ordering::Relaxed);
        let _ = handle.join();
        if let Err(e) = view {
            println!("tui failed: {e}");
        }
    }

    fn join_search(&mut self) {
        if let Some(handle) = self.search_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Default for UciSession {
    fn default() -> Self {
        Self::new()
    }
}

fn log_summary(path: &str, board: &Board, status: &Arc<Mutex<SearchStatus>>) {
    let Ok(snapshot) = status.lock().map(|s| s.clone()) else {
        return;
    };
    let (score_cp, score_mate) = match snapshot.score {
        ScoreView::Cp(cp) => (Some(cp), None),
        ScoreView::Mate(n) => (None, Some(n)),
    };
    let event = SearchSummaryV1 {
        event: SearchSummaryV1::EVENT,
        ts_ms: now_ms(),
        fen: board.to_fen(),
        depth: snapshot.depth,
        seldepth: snapshot.seldepth,
        nodes: snapshot.nodes,
        nps: snapshot.nps,
        elapsed_ms: snapshot.elapsed_ms,
        half_switches: snapshot.half_switches,
        hashfull: snapshot.hashfull,
        best_move: snapshot.best_move.to_string(),
        score_cp,
        score_mate,
    };
    if let Ok(mut writer) = NdjsonWriter::open_append(path) {
        let _ = writer.write_event(&event);
        let _ = writer.flush();
    }
}
