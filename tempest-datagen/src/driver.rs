//! Self-play driver: independent search workers playing randomised games
//! and streaming MontyFormat records to disk.

use crate::writer::{GameWriter, WriterError};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tempest_core::Board;
use tempest_logging::{now_ms, DatagenProgressV1, NdjsonWriter};
use tempest_mcts::{SearchLimits, SearchParameters, Searcher};
use tempest_nets::wdl_to_cp;
use thiserror::Error;

/// Uniform-random plies applied before each game (plus a coin flip).
pub const RAND_MOVES: usize = 8;
/// Tree size per worker, in MB.
pub const HASH_PER_WORKER_MB: usize = 128;
/// Openings whose first search lands outside this band are re-rolled.
pub const MAX_STARTPOS_SCORE: i32 = 400;
/// Flat policy temperature for data generation.
pub const DATAGEN_TEMPERATURE: f32 = 1.05;
/// Node budget used when verifying `genfens` openings.
pub const GENFENS_VERIFY_NODES: u64 = 2_000;

#[derive(Debug, Error)]
pub enum DatagenError {
    #[error("writer: {0}")]
    Writer(#[from] WriterError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("a datagen worker failed; see stderr")]
    WorkerFailed,
}

#[derive(Debug, Clone)]
pub struct DatagenConfig {
    pub threads: usize,
    pub positions: u64,
    pub nodes: u64,
    pub out_dir: PathBuf,
}

impl Default for DatagenConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            positions: 100_000_000,
            nodes: 2_000,
            out_dir: PathBuf::from("./data"),
        }
    }
}

fn datagen_params(pos_history: Vec<u64>) -> SearchParameters {
    let mut params = SearchParameters::silent(pos_history);
    params.policy_temp = DATAGEN_TEMPERATURE;
    params.root_policy_temp = DATAGEN_TEMPERATURE;
    params
}

fn output_path(out_dir: &PathBuf, rng: &mut impl Rng) -> PathBuf {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    out_dir.join(format!("data-{}-{:08x}.tempestdata", secs, rng.gen::<u32>()))
}

/// Apply `RAND_MOVES + coin` random legal moves; `None` when the game
/// ended during randomisation.
fn randomised_opening(rng: &mut impl Rng) -> Option<Board> {
    let mut board = Board::startpos();
    let mut history = vec![board.zobrist()];
    let plies = RAND_MOVES + rng.gen_range(0..2);
    for _ in 0..plies {
        let moves = board.legal_moves();
        if moves.is_empty() {
            return None;
        }
        board.make_move(moves.get(rng.gen_range(0..moves.len())));
        history.push(board.zobrist());
        if board.is_game_over(&history) {
            return None;
        }
    }
    Some(board)
}

struct WorkerShared {
    stop: Arc<AtomicBool>,
    positions: Arc<AtomicU64>,
    board_view: Arc<Mutex<Board>>,
}

fn run_worker(cfg: &DatagenConfig, shared: &WorkerShared, seed: u64) -> Result<(), DatagenError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut writer = GameWriter::create(output_path(&cfg.out_dir, &mut rng))?;
    let mut searcher = Searcher::new(HASH_PER_WORKER_MB);
    // Interrupting the driver must also interrupt a search in flight.
    searcher.set_stop_handle(Arc::clone(&shared.stop));
    let limits = SearchLimits::nodes(cfg.nodes);

    'games: while !shared.stop.load(Ordering::Relaxed) {
        let Some(start) = randomised_opening(&mut rng) else {
            continue;
        };

        let mut board = start;
        let mut history = vec![board.zobrist()];
        writer.set_startpos(start);
        if let Ok(mut view) = shared.board_view.lock() {
            *view = board;
        }

        let mut first_move = true;
        while !board.is_game_over(&history) {
            if shared.stop.load(Ordering::Relaxed) {
                return Ok(());
            }

            searcher.set_position(board);
            let params = datagen_params(history[..history.len() - 1].to_vec());
            let best = searcher.search(&params, &limits);
            if shared.stop.load(Ordering::Relaxed) {
                return Ok(());
            }
            if best.is_null() {
                // Degenerate budget; nothing worth recording.
                continue 'games;
            }

            let root_q = searcher.root_q();
            if first_move && wdl_to_cp((root_q as f64).clamp(-0.9999, 0.9999)).abs() > MAX_STARTPOS_SCORE {
                // Unbalanced opening; roll a fresh one.
                writer.set_startpos(start);
                continue 'games;
            }
            first_move = false;

            writer.add_move(&board, best, root_q, &searcher.root_children());
            board.make_move(best);
            history.push(board.zobrist());
            if let Ok(mut view) = shared.board_view.lock() {
                *view = board;
            }
            shared.positions.fetch_add(1, Ordering::Relaxed);
        }

        let wdl = if board.is_draw(&history) || !board.in_check() {
            1
        } else if board.stm() == start.stm() {
            0
        } else {
            2
        };
        writer.write_game(wdl)?;
    }
    Ok(())
}

/// Run self-play until `cfg.positions` positions have been searched.
pub fn run(cfg: DatagenConfig) -> Result<(), DatagenError> {
    std::fs::create_dir_all(&cfg.out_dir)?;

    let stop = Arc::new(AtomicBool::new(false));
    let failed = Arc::new(AtomicBool::new(false));
    let positions: Vec<Arc<AtomicU64>> = (0..cfg.threads).map(|_| Arc::new(AtomicU64::new(0))).collect();
    let boards: Vec<Arc<Mutex<Board>>> = (0..cfg.threads)
        .map(|_| Arc::new(Mutex::new(Board::startpos())))
        .collect();

    let mut log = NdjsonWriter::open_append(cfg.out_dir.join("datagen.ndjson")).ok();

    let started = Instant::now();
    let mut nps_window: VecDeque<f64> = VecDeque::with_capacity(100);
    let mut last_log = Instant::now();

    std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for id in 0..cfg.threads {
            let shared = WorkerShared {
                stop: Arc::clone(&stop),
                positions: Arc::clone(&positions[id]),
                board_view: Arc::clone(&boards[id]),
            };
            let cfg = cfg.clone();
            let failed = Arc::clone(&failed);
            handles.push(scope.spawn(move || {
                if let Err(e) = run_worker(&cfg, &shared, 0xDA7A_0000 + id as u64) {
                    eprintln!("datagen worker {id} failed: {e}");
                    failed.store(true, Ordering::Relaxed);
                }
            }));
        }

        loop {
            std::thread::sleep(Duration::from_millis(50));
            let total: u64 = positions.iter().map(|p| p.load(Ordering::Relaxed)).sum();
            let elapsed = started.elapsed().as_secs_f64().max(1e-3);

            if nps_window.len() == 100 {
                nps_window.pop_front();
            }
            nps_window.push_back(total as f64 / elapsed);
            let nps: f64 = nps_window.iter().sum::<f64>() / nps_window.len() as f64;

            print!(
                "\rpositions {:>12} / {}   pos/s {:>8.1}   elapsed {:>6.0}s   ",
                total, cfg.positions, nps, elapsed
            );
            let _ = std::io::stdout().flush();

            if last_log.elapsed() >= Duration::from_secs(5) {
                if let Some(log) = log.as_mut() {
                    let _ = log.write_event(&DatagenProgressV1 {
                        event: DatagenProgressV1::EVENT,
                        ts_ms: now_ms(),
                        threads: cfg.threads,
                        target_positions: cfg.positions,
                        positions: total,
                        positions_per_second: nps,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    });
                    let _ = log.flush();
                }
                last_log = Instant::now();
            }

            if total >= cfg.positions || failed.load(Ordering::Relaxed) {
                break;
            }
        }

        stop.store(true, Ordering::Relaxed);
        for handle in handles {
            let _ = handle.join();
        }
    });

    println!();
    if failed.load(Ordering::Relaxed) {
        return Err(DatagenError::WorkerFailed);
    }
    println!("datagen complete: {} positions", cfg.positions);
    Ok(())
}

/// Print `count` verified, roughly balanced opening FENs.
pub fn gen_fens(count: u64, seed: u64, nodes: u64) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut searcher = Searcher::new(16);
    let limits = SearchLimits::nodes(nodes.max(1));

    let mut produced = 0;
    while produced < count {
        let Some(board) = randomised_opening(&mut rng) else {
            continue;
        };
        searcher.new_game();
        searcher.set_position(board);
        searcher.search(&datagen_params(Vec::new()), &limits);
        let cp = wdl_to_cp((searcher.root_q() as f64).clamp(-0.9999, 0.9999));
        if cp.abs() > MAX_STARTPOS_SCORE {
            continue;
        }
        println!("info string genfens {}", board.to_fen());
        produced += 1;
    }
    println!("info string Generated {produced} positions");
}
