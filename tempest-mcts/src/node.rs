//! Tree nodes: packed index, terminal-state tag and quantised statistics.

use tempest_core::Move;

/// 63-bit slot index plus one bit selecting the tree half.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[repr(transparent)]
pub struct NodeIndex(u64);

impl NodeIndex {
    const HALF_BIT: u64 = 1 << 63;

    #[inline]
    pub fn new(index: u64, half: u8) -> Self {
        debug_assert!(index & Self::HALF_BIT == 0);
        Self(index | ((half as u64) << 63))
    }

    #[inline]
    pub fn index(self) -> u64 {
        self.0 & !Self::HALF_BIT
    }

    #[inline]
    pub fn half(self) -> u8 {
        (self.0 >> 63) as u8
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum Outcome {
    #[default]
    Ongoing,
    Win,
    Draw,
    Loss,
}

/// Terminal tag of a node, from the perspective of the side to move at
/// that node. `distance` counts plies to the forced mate.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct GameState {
    outcome: Outcome,
    distance: u16,
}

impl GameState {
    pub const ONGOING: Self = Self {
        outcome: Outcome::Ongoing,
        distance: 0,
    };

    #[inline]
    pub fn win(distance: u16) -> Self {
        Self {
            outcome: Outcome::Win,
            distance,
        }
    }

    #[inline]
    pub fn loss(distance: u16) -> Self {
        Self {
            outcome: Outcome::Loss,
            distance,
        }
    }

    #[inline]
    pub fn draw() -> Self {
        Self {
            outcome: Outcome::Draw,
            distance: 0,
        }
    }

    #[inline]
    pub fn outcome(self) -> Outcome {
        self.outcome
    }

    #[inline]
    pub fn distance(self) -> u16 {
        self.distance
    }

    #[inline]
    pub fn is_terminal(self) -> bool {
        self.outcome != Outcome::Ongoing
    }
}

/// Fixed-point scale of the accumulated score: 1.0 == 32768.
const SCORE_ONE: f32 = 32768.0;

/// One search-tree vertex. 32 bytes; children live in a contiguous block
/// starting at `first_child`, in move-generation order.
#[derive(Copy, Clone)]
pub struct Node {
    total_score: i64,
    pub visits: u64,
    pub first_child: NodeIndex,
    pub mv: Move,
    pub state: GameState,
    pub num_children: u8,
    policy: u8,
    gini: u8,
}

impl Node {
    pub fn new(mv: Move) -> Self {
        Self {
            total_score: 0,
            visits: 0,
            first_child: NodeIndex::default(),
            mv,
            state: GameState::ONGOING,
            num_children: 0,
            policy: 0,
            gini: 0,
        }
    }

    #[inline]
    pub fn total_score(&self) -> f32 {
        self.total_score as f32 / SCORE_ONE
    }

    #[inline]
    pub fn add_score(&mut self, score: f32) {
        self.total_score += (score * SCORE_ONE) as i64;
    }

    /// Mean backed-up score; only meaningful once visited.
    #[inline]
    pub fn q(&self) -> f32 {
        debug_assert!(self.visits > 0);
        self.total_score() / self.visits as f32
    }

    #[inline]
    pub fn policy(&self) -> f32 {
        self.policy as f32 / 255.0
    }

    #[inline]
    pub fn set_policy(&mut self, p: f32) {
        self.policy = (p * 255.0).round() as u8;
    }

    #[inline]
    pub fn gini_impurity(&self) -> f32 {
        self.gini as f32 / 255.0
    }

    #[inline]
    pub fn set_gini_impurity(&mut self, g: f32) {
        self.gini = (g.clamp(0.0, 1.0) * 255.0) as u8;
    }

    #[inline]
    pub fn is_expanded(&self) -> bool {
        self.num_children > 0
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new(Move::NULL)
    }
}
