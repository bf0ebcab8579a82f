//! Typed UCI options with their ranges and defaults.

use std::fmt;

pub const HASH_MIN_MB: usize = 1;
pub const HASH_MAX_MB: usize = 1_048_576;
pub const MULTIPV_MAX: usize = 255;

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum SearchMode {
    #[default]
    Full,
    Policy,
    Value,
}

impl SearchMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "full" => Some(SearchMode::Full),
            "policy" => Some(SearchMode::Policy),
            "value" => Some(SearchMode::Value),
            _ => None,
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMode::Full => write!(f, "full"),
            SearchMode::Policy => write!(f, "policy"),
            SearchMode::Value => write!(f, "value"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EngineOptions {
    pub threads: usize,
    pub hash_mb: usize,
    pub minimal: bool,
    pub multipv: usize,
    pub chess960: bool,
    pub search_mode: SearchMode,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            threads: 1,
            hash_mb: tempest_mcts::DEFAULT_HASH_MB,
            minimal: false,
            multipv: 1,
            chess960: false,
            search_mode: SearchMode::Full,
        }
    }
}

impl EngineOptions {
    /// The `option name ...` block sent in reply to `uci`.
    pub fn print_uci_block(&self) {
        println!("option name Threads type spin default 1 min 1 max 1");
        println!(
            "option name Hash type spin default {} min {HASH_MIN_MB} max {HASH_MAX_MB}",
            tempest_mcts::DEFAULT_HASH_MB
        );
        println!("option name Minimal type check default false");
        println!("option name MultiPV type spin default 1 min 1 max {MULTIPV_MAX}");
        println!("option name UCI_Chess960 type check default false");
        println!("option name SearchMode type combo default full var full var policy var value");
    }

    /// Apply one `setoption`; returns a description of what changed, or an
    /// error message for the protocol layer to print.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), String> {
        match name {
            "Threads" => {
                // Single-threaded search; accepted for GUI compatibility.
                let _: usize = value.parse().map_err(|_| format!("bad Threads value {value:?}"))?;
                self.threads = 1;
                Ok(())
            }
            "Hash" => {
                let mb: usize = value.parse().map_err(|_| format!("bad Hash value {value:?}"))?;
                if !(HASH_MIN_MB..=HASH_MAX_MB).contains(&mb) {
                    return Err(format!("Hash must be in [{HASH_MIN_MB}, {HASH_MAX_MB}] MB"));
                }
                self.hash_mb = mb;
                Ok(())
            }
            "Minimal" => {
                self.minimal = value.eq_ignore_ascii_case("true");
                Ok(())
            }
            "MultiPV" => {
                let n: usize = value.parse().map_err(|_| format!("bad MultiPV value {value:?}"))?;
                if !(1..=MULTIPV_MAX).contains(&n) {
                    return Err(format!("MultiPV must be in [1, {MULTIPV_MAX}]"));
                }
                self.multipv = n;
                Ok(())
            }
            "UCI_Chess960" => {
                self.chess960 = value.eq_ignore_ascii_case("true");
                Ok(())
            }
            "SearchMode" => {
                self.search_mode = SearchMode::parse(value)
                    .ok_or_else(|| format!("SearchMode must be full, policy or value, got {value:?}"))?;
                Ok(())
            }
            other => Err(format!("unknown option {other:?}")),
        }
    }
}
