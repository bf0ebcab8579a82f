//! Game writer: buffers one game, then appends it to the output file in a
//! window where SIGINT is held back, so records are never torn.

use crate::format::{pack_move, GameRecord, PackedBoard, RecordedMove};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tempest_core::{Board, Move};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Blocks SIGINT for the guard's lifetime; a pending SIGINT is re-raised
/// on drop, after the protected write has flushed.
struct SigintGuard {
    #[cfg(unix)]
    old_mask: libc::sigset_t,
}

impl SigintGuard {
    fn new() -> Self {
        #[cfg(unix)]
        {
            unsafe {
                let mut set: libc::sigset_t = std::mem::zeroed();
                libc::sigemptyset(&mut set);
                libc::sigaddset(&mut set, libc::SIGINT);
                let mut old_mask: libc::sigset_t = std::mem::zeroed();
                libc::pthread_sigmask(libc::SIG_BLOCK, &set, &mut old_mask);
                Self { old_mask }
            }
        }
        #[cfg(not(unix))]
        {
            Self {}
        }
    }
}

impl Drop for SigintGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        unsafe {
            let mut pending: libc::sigset_t = std::mem::zeroed();
            libc::sigpending(&mut pending);
            let had_sigint = libc::sigismember(&pending, libc::SIGINT) == 1;
            libc::pthread_sigmask(libc::SIG_SETMASK, &self.old_mask, std::ptr::null_mut());
            if had_sigint {
                libc::raise(libc::SIGINT);
            }
        }
    }
}

pub struct GameWriter {
    file: BufWriter<File>,
    start: Board,
    moves: Vec<RecordedMove>,
}

impl GameWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, WriterError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: BufWriter::new(file),
            start: Board::startpos(),
            moves: Vec::new(),
        })
    }

    /// Record the game's start position; drops any buffered moves.
    pub fn set_startpos(&mut self, board: Board) {
        self.start = board;
        self.moves.clear();
    }

    /// Append one searched move: the choice, the root score and the root
    /// children's visit counts (in any order).
    pub fn add_move(&mut self, board: &Board, chosen: Move, root_q: f32, children: &[(Move, u64)]) {
        let mut dist: Vec<(u16, u64)> = children
            .iter()
            .map(|&(mv, visits)| (pack_move(board, mv), visits))
            .collect();
        dist.sort_by_key(|&(packed, _)| packed);

        self.moves.push(RecordedMove {
            packed_move: pack_move(board, chosen),
            scaled_q: GameRecord::scaled_q_of((root_q as f64).clamp(-1.0, 1.0)),
            visit_dist: crate::format::scale_visits(&dist),
        });
    }

    /// Serialise the buffered game and flush it, shielded from SIGINT.
    pub fn write_game(&mut self, wdl: u8) -> Result<(), WriterError> {
        debug_assert!(wdl <= 2);

        // Standard chess: castle rooks sit on the a- and h-files, which
        // coincide with the queenside/kingside fallbacks.
        let castle_files = [0u8, 7, 0, 7];

        let record = GameRecord {
            board: PackedBoard::pack(&self.start),
            castle_files,
            wdl,
            moves: std::mem::take(&mut self.moves),
        };

        let mut bytes = Vec::new();
        record.serialise(&mut bytes);

        let _guard = SigintGuard::new();
        self.file.write_all(&bytes)?;
        self.file.flush()?;
        Ok(())
    }
}
