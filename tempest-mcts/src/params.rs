//! Search tunables, per-search parameters and limits.

use std::time::{Duration, Instant};
use thiserror::Error;

// Exploration constants. The visit- and gini-scaling in `search::cpuct`
// stretches these as the subtree grows.
pub const CPUCT: f32 = 1.1;
pub const ROOT_CPUCT: f32 = 2.4;
pub const CPUCT_VISIT_SCALE: f32 = 8192.0;

pub const GINI_BASE: f32 = 0.45;
pub const GINI_SCALAR: f32 = 1.6;
pub const GINI_MIN: f32 = 1.0;
pub const GINI_MAX: f32 = 1.5;

pub const POLICY_TEMPERATURE: f32 = 0.75;
pub const ROOT_POLICY_TEMPERATURE: f32 = 2.9;

pub const BUTTERFLY_BONUS_DIVISOR: i32 = 8192;
pub const BUTTERFLY_POLICY_DIVISOR: f32 = 16384.0;

/// Subtracted from every clock-driven budget.
pub const MOVE_OVERHEAD_MS: i64 = 20;
/// Ceiling on the UCI info cadence.
pub const UCI_REPORT_PERIOD: Duration = Duration::from_millis(1000);

#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("invalid search parameter: {msg}")]
    Invalid { msg: &'static str },
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Reporting {
    /// No output at all (datagen, tests).
    Silent,
    /// Full `info` lines plus `bestmove`.
    Uci,
    /// `bestmove` only.
    UciMinimal,
}

#[derive(Clone)]
pub struct SearchParameters {
    /// Hashes of the positions played before the root, oldest first.
    pub pos_history: Vec<u64>,
    pub cpuct: f32,
    pub root_cpuct: f32,
    pub policy_temp: f32,
    pub root_policy_temp: f32,
    pub multipv: usize,
    pub reporting: Reporting,
}

impl SearchParameters {
    pub fn uci(pos_history: Vec<u64>) -> Self {
        Self {
            pos_history,
            cpuct: CPUCT,
            root_cpuct: ROOT_CPUCT,
            policy_temp: POLICY_TEMPERATURE,
            root_policy_temp: ROOT_POLICY_TEMPERATURE,
            multipv: 1,
            reporting: Reporting::Uci,
        }
    }

    pub fn silent(pos_history: Vec<u64>) -> Self {
        Self {
            reporting: Reporting::Silent,
            ..Self::uci(pos_history)
        }
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if !(self.cpuct.is_finite() && self.cpuct > 0.0)
            || !(self.root_cpuct.is_finite() && self.root_cpuct > 0.0)
        {
            return Err(ParamsError::Invalid {
                msg: "cpuct must be finite and > 0",
            });
        }
        if !(self.policy_temp > 0.0) || !(self.root_policy_temp > 0.0) {
            return Err(ParamsError::Invalid {
                msg: "policy temperature must be > 0",
            });
        }
        if self.multipv == 0 {
            return Err(ParamsError::Invalid {
                msg: "multipv must be >= 1",
            });
        }
        Ok(())
    }
}

/// Hard limits for one `search` call. Zero means "no limit" throughout.
#[derive(Clone)]
pub struct SearchLimits {
    /// Taken when the `go` command arrived, so protocol overhead counts
    /// against the budget.
    pub started: Instant,
    pub mate: bool,
    pub depth: u64,
    pub nodes: u64,
    pub movetime: i64,
    pub time: i64,
    pub inc: i64,
}

impl SearchLimits {
    pub fn none() -> Self {
        Self {
            started: Instant::now(),
            mate: false,
            depth: 0,
            nodes: 0,
            movetime: 0,
            time: 0,
            inc: 0,
        }
    }

    pub fn nodes(n: u64) -> Self {
        Self {
            nodes: n,
            ..Self::none()
        }
    }

    /// Wall-clock budget in milliseconds, or 0 when untimed.
    pub fn time_budget(&self) -> i64 {
        let mut budget = if self.movetime != 0 {
            self.movetime
        } else {
            self.time / 20 + self.inc / 2
        };
        if self.time != 0 || self.inc != 0 {
            budget = (budget - MOVE_OVERHEAD_MS).max(1);
        }
        budget
    }

    #[inline]
    pub fn elapsed_ms(&self) -> i64 {
        self.started.elapsed().as_millis() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movetime_overrides_clock_budget() {
        let mut l = SearchLimits::none();
        l.movetime = 500;
        l.time = 60_000;
        assert_eq!(l.time_budget(), 500 - MOVE_OVERHEAD_MS);
    }

    #[test]
    fn clock_budget_divides_time_and_increment() {
        let mut l = SearchLimits::none();
        l.time = 20_000;
        l.inc = 200;
        assert_eq!(l.time_budget(), 20_000 / 20 + 100 - MOVE_OVERHEAD_MS);
    }

    #[test]
    fn tiny_clocks_keep_a_positive_budget() {
        let mut l = SearchLimits::none();
        l.time = 10;
        assert_eq!(l.time_budget(), 1);
    }

    #[test]
    fn untimed_search_has_no_budget() {
        assert_eq!(SearchLimits::nodes(1000).time_budget(), 0);
    }

    #[test]
    fn parameter_validation_catches_nonsense() {
        let mut p = SearchParameters::uci(Vec::new());
        assert!(p.validate().is_ok());
        p.multipv = 0;
        assert!(p.validate().is_err());
        p.multipv = 1;
        p.policy_temp = 0.0;
        assert!(p.validate().is_err());
    }
}
