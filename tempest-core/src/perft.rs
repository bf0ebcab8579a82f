//! Move-generator validation: perft, bulk counting and suite files.

use crate::board::Board;
use crate::movegen::MoveList;
use std::fs;
use std::path::Path;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PerftSuiteError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {msg}")]
    Malformed { line: usize, msg: String },
}

pub fn perft(board: &Board, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let mut moves = MoveList::new();
    board.generate_moves(&mut moves);
    if depth == 1 {
        return moves.len() as u64;
    }
    let mut nodes = 0;
    for mv in moves.iter() {
        nodes += perft(&board.child(mv), depth - 1);
    }
    nodes
}

/// Per-move breakdown at the root, printed like `e2e4: 600`.
pub fn perft_divide(board: &Board, depth: u32) -> u64 {
    let start = Instant::now();
    let mut total = 0;
    for mv in board.legal_moves().iter() {
        let nodes = if depth > 1 { perft(&board.child(mv), depth - 1) } else { 1 };
        println!("{mv}: {nodes}");
        total += nodes;
    }
    let elapsed = start.elapsed();
    println!();
    println!("Nodes: {total}");
    println!(
        "NPS:   {}",
        (total as f64 / elapsed.as_secs_f64().max(1e-9)) as u64
    );
    total
}

/// Bulk counting only, no per-move output.
pub fn perft_bulk(board: &Board, depth: u32) -> u64 {
    let start = Instant::now();
    let total = perft(board, depth);
    let elapsed = start.elapsed();
    println!("Nodes: {total}");
    println!(
        "NPS:   {}",
        (total as f64 / elapsed.as_secs_f64().max(1e-9)) as u64
    );
    total
}

/// Run an EPD-style perft suite: `fen ;D1 20 ;D2 400 ...` per line.
/// Returns `(passed, failed)`.
pub fn perft_suite(path: &Path) -> Result<(usize, usize), PerftSuiteError> {
    let content = fs::read_to_string(path)?;
    let mut passed = 0;
    let mut failed = 0;

    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split(';');
        let fen = parts
            .next()
            .ok_or_else(|| PerftSuiteError::Malformed {
                line: lineno + 1,
                msg: "missing FEN".into(),
            })?
            .trim();
        let board = Board::from_fen(fen).map_err(|e| PerftSuiteError::Malformed {
            line: lineno + 1,
            msg: e.to_string(),
        })?;

        for entry in parts {
            let entry = entry.trim();
            let mut fields = entry.split_whitespace();
            let (Some(d), Some(n)) = (fields.next(), fields.next()) else {
                continue;
            };
            let depth: u32 = d
                .trim_start_matches(['D', 'd'])
                .parse()
                .map_err(|_| PerftSuiteError::Malformed {
                    line: lineno + 1,
                    msg: format!("bad depth token {d:?}"),
                })?;
            let expected: u64 = n.parse().map_err(|_| PerftSuiteError::Malformed {
                line: lineno + 1,
                msg: format!("bad node count {n:?}"),
            })?;

            let got = perft(&board, depth);
            if got == expected {
                passed += 1;
            } else {
                failed += 1;
                println!("FAIL {fen} depth {depth}: expected {expected}, got {got}");
            }
        }
    }

    println!("Suite: {passed} passed, {failed} failed");
    Ok((passed, failed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startpos_counts() {
        let board = Board::startpos();
        assert_eq!(perft(&board, 1), 20);
        assert_eq!(perft(&board, 2), 400);
        assert_eq!(perft(&board, 3), 8_902);
        assert_eq!(perft(&board, 4), 197_281);
    }

    #[test]
    fn kiwipete_counts() {
        let board = Board::kiwipete();
        assert_eq!(perft(&board, 1), 48);
        assert_eq!(perft(&board, 2), 2_039);
        assert_eq!(perft(&board, 3), 97_862);
    }

    #[test]
    fn endgame_with_en_passant_counts() {
        let board = Board::from_fen("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1").unwrap();
        assert_eq!(perft(&board, 1), 14);
        assert_eq!(perft(&board, 2), 191);
        assert_eq!(perft(&board, 3), 2_812);
        assert_eq!(perft(&board, 4), 43_238);
    }

    #[test]
    fn promotion_heavy_counts() {
        let board =
            Board::from_fen("r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1")
                .unwrap();
        assert_eq!(perft(&board, 1), 6);
        assert_eq!(perft(&board, 2), 264);
        assert_eq!(perft(&board, 3), 9_467);
    }

    #[test]
    fn buggy_castling_rights_position_counts() {
        let board =
            Board::from_fen("rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8").unwrap();
        assert_eq!(perft(&board, 1), 44);
        assert_eq!(perft(&board, 2), 1_486);
        assert_eq!(perft(&board, 3), 62_379);
    }

    #[test]
    fn symmetric_middlegame_counts() {
        let board = Board::from_fen(
            "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
        )
        .unwrap();
        assert_eq!(perft(&board, 1), 46);
        assert_eq!(perft(&board, 2), 2_079);
        assert_eq!(perft(&board, 3), 89_890);
    }
}
