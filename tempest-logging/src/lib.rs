//! tempest-logging: append-only NDJSON events for run post-mortems.
//!
//! UCI stays on stdout; everything else that is worth keeping (search
//! summaries, datagen progress) goes through here, one JSON object per
//! line so a crashed run loses at most a partial trailing line.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use thiserror::Error;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Error)]
pub enum LogError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Milliseconds since the epoch, for event timestamps.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// One finished search, as reported to the log sink.
#[derive(Debug, Clone, Serialize)]
pub struct SearchSummaryV1 {
    pub event: &'static str,
    pub ts_ms: u64,
    pub fen: String,
    pub depth: u64,
    pub seldepth: u64,
    pub nodes: u64,
    pub nps: u64,
    pub elapsed_ms: u64,
    pub half_switches: u64,
    pub hashfull: u64,
    pub best_move: String,
    pub score_cp: Option<i32>,
    pub score_mate: Option<i32>,
}

impl SearchSummaryV1 {
    pub const EVENT: &'static str = "search_summary_v1";
}

/// Periodic datagen progress snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct DatagenProgressV1 {
    pub event: &'static str,
    pub ts_ms: u64,
    pub threads: usize,
    pub target_positions: u64,
    pub positions: u64,
    pub positions_per_second: f64,
    pub elapsed_ms: u64,
}

impl DatagenProgressV1 {
    pub const EVENT: &'static str = "datagen_progress_v1";
}

/// Append-only NDJSON writer.
///
/// Contract: each call writes exactly one JSON object plus a newline.
pub struct NdjsonWriter {
    w: BufWriter<File>,
    lines_since_flush: u64,
    flush_every_lines: u64,
}

impl NdjsonWriter {
    /// Open for append, creating the file if needed.
    pub fn open_append(path: impl AsRef<Path>) -> Result<Self, LogError> {
        Self::open_append_with_flush(path, 0)
    }

    /// `flush_every_lines = 0` disables periodic flushing.
    pub fn open_append_with_flush(
        path: impl AsRef<Path>,
        flush_every_lines: u64,
    ) -> Result<Self, LogError> {
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            w: BufWriter::new(f),
            lines_since_flush: 0,
            flush_every_lines,
        })
    }

    pub fn write_event<T: Serialize>(&mut self, event: &T) -> Result<(), LogError> {
        let mut buf = serde_json::to_vec(event)?;
        buf.push(b'\n');
        self.w.write_all(&buf)?;
        self.lines_since_flush += 1;
        if self.flush_every_lines > 0 && self.lines_since_flush >= self.flush_every_lines {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), LogError> {
        self.w.flush()?;
        self.lines_since_flush = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::fs;

    fn read_ndjson_lenient(path: &Path) -> Vec<Value> {
        let s = fs::read_to_string(path).expect("read");
        s.lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str::<Value>(l).ok())
            .collect()
    }

    #[test]
    fn writes_one_json_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.ndjson");
        let mut w = NdjsonWriter::open_append(&path).unwrap();

        #[derive(Serialize)]
        struct E {
            event: &'static str,
            n: u32,
        }

        w.write_event(&E { event: "e", n: 1 }).unwrap();
        w.write_event(&E { event: "e", n: 2 }).unwrap();
        w.flush().unwrap();

        let vals = read_ndjson_lenient(&path);
        assert_eq!(vals.len(), 2);
        assert_eq!(vals[0]["n"], 1);
        assert_eq!(vals[1]["n"], 2);
    }

    #[test]
    fn lenient_reader_survives_a_torn_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.ndjson");
        {
            let mut w = NdjsonWriter::open_append(&path).unwrap();
            #[derive(Serialize)]
            struct E {
                event: &'static str,
            }
            w.write_event(&E { event: "whole" }).unwrap();
            w.flush().unwrap();
        }

        // Simulate a crash mid-write.
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(br#"{"event":"torn","x":"#).unwrap();
        f.flush().unwrap();

        let vals = read_ndjson_lenient(&path);
        assert_eq!(vals.len(), 1);
        assert_eq!(vals[0]["event"], "whole");
    }

    #[test]
    fn search_summary_serialises_with_its_tag() {
        let ev = SearchSummaryV1 {
            event: SearchSummaryV1::EVENT,
            ts_ms: now_ms(),
            fen: "startpos".into(),
            depth: 10,
            seldepth: 22,
            nodes: 100_000,
            nps: 500_000,
            elapsed_ms: 200,
            half_switches: 1,
            hashfull: 420,
            best_move: "e2e4".into(),
            score_cp: Some(35),
            score_mate: None,
        };
        let v: Value = serde_json::from_str(&serde_json::to_string(&ev).unwrap()).unwrap();
        assert_eq!(v["event"], "search_summary_v1");
        assert_eq!(v["score_cp"], 35);
        assert!(v["score_mate"].is_null());
    }
}
