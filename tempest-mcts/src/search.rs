//! The PUCT search loop: selection, expansion, evaluation and backup over
//! the two-half arena, plus reporting and tree reuse between moves.

use crate::cache::CacheEntry;
use crate::history::ButterflyHistory;
use crate::node::{GameState, Node, NodeIndex, Outcome};
use crate::params::{
    Reporting, SearchLimits, SearchParameters, CPUCT_VISIT_SCALE, GINI_BASE, GINI_MAX, GINI_MIN,
    GINI_SCALAR, UCI_REPORT_PERIOD,
};
use crate::priors::fill_policy;
use crate::status::{ScoreView, SearchStatus};
use crate::tree::{Tree, DEFAULT_HASH_MB};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tempest_core::{Board, Move};
use tempest_nets::{cp_to_wdl, evaluate, wdl_to_cp, PolicyAccumulator};

const MAX_PV_LEN: usize = 128;

/// Terminal classification of a position the search is visiting for the
/// first time. `history` must include the position itself.
pub fn classify(board: &Board, history: &[u64]) -> GameState {
    if board.is_draw(history) {
        return GameState::draw();
    }
    if board.legal_moves().is_empty() {
        return if board.in_check() {
            GameState::loss(0)
        } else {
            GameState::draw()
        };
    }
    GameState::ONGOING
}

/// Reporting/selection score of a node from its parent's point of view is
/// `-adjusted_score(node)`; terminal nodes rank by mate distance so the PV
/// prefers the shortest win and the longest loss.
fn adjusted_score(node: &Node) -> f32 {
    match node.state.outcome() {
        Outcome::Draw => 0.0,
        Outcome::Win => 2.0 - node.state.distance() as f32 / 1024.0,
        Outcome::Loss => -2.0 + node.state.distance() as f32 / 1024.0,
        Outcome::Ongoing => {
            if node.visits > 0 {
                node.q()
            } else {
                0.0
            }
        }
    }
}

fn score_cp(q: f32) -> i32 {
    wdl_to_cp((q as f64).clamp(-0.9999, 0.9999))
}

/// Exploration coefficient: grows with the subtree and shrinks for parents
/// whose priors are concentrated.
fn cpuct_for(parent: &Node, ctx: &SearchContext, is_root: bool) -> f32 {
    let mut c = if is_root { ctx.root_cpuct } else { ctx.cpuct };
    c *= 1.0 + ((parent.visits as f32 + CPUCT_VISIT_SCALE) / 8192.0).ln();
    c *= (GINI_BASE - GINI_SCALAR * (parent.gini_impurity() + 0.001).ln()).clamp(GINI_MIN, GINI_MAX);
    c
}

/// UCI mate count (in moves, signed from the root player's view) for a
/// root child with a proven state.
fn child_mate_moves(state: GameState) -> i32 {
    let plies = state.distance() as i32 + 1;
    let moves = (plies + 1) / 2;
    match state.outcome() {
        Outcome::Loss => moves,
        _ => -moves,
    }
}

struct SearchContext {
    current_index: u64,
    seldepth: u64,
    pos_history: Vec<u64>,
    history_base: usize,
    cpuct: f32,
    root_cpuct: f32,
    policy_temp: f32,
    root_policy_temp: f32,
}

pub struct Searcher {
    pub tree: Tree,
    pub root_board: Board,
    pub butterfly: ButterflyHistory,
    stop: Arc<AtomicBool>,
    status: Option<Arc<Mutex<SearchStatus>>>,
    prev_root: Option<Board>,
    node_count: u64,
    half_switches: u64,
}

impl Searcher {
    pub fn new(hash_mb: usize) -> Self {
        Self {
            tree: Tree::new(hash_mb),
            root_board: Board::startpos(),
            butterfly: ButterflyHistory::new(),
            stop: Arc::new(AtomicBool::new(false)),
            status: None,
            prev_root: None,
            node_count: 0,
            half_switches: 0,
        }
    }

    /// Shared flag the command layer flips to interrupt a running search.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Share an externally owned stop flag (the datagen driver hands the
    /// same flag to every worker).
    pub fn set_stop_handle(&mut self, stop: Arc<AtomicBool>) {
        self.stop = stop;
    }

    /// Attach a snapshot sink for a render thread.
    pub fn set_status_sink(&mut self, sink: Option<Arc<Mutex<SearchStatus>>>) {
        self.status = sink;
    }

    pub fn set_position(&mut self, board: Board) {
        self.root_board = board;
    }

    pub fn set_hash(&mut self, size_mb: usize) {
        self.tree.resize(size_mb);
        self.prev_root = None;
    }

    /// `ucinewgame`: drop all carried-over state.
    pub fn new_game(&mut self) {
        self.tree.reset();
        self.butterfly.clear();
        self.prev_root = None;
    }

    #[inline]
    pub fn nodes_searched(&self) -> u64 {
        self.node_count
    }

    #[inline]
    pub fn half_switches(&self) -> u64 {
        self.half_switches
    }

    /// Root score from the side to move, in [-1, 1].
    pub fn root_q(&self) -> f32 {
        let root = self.tree.root();
        if root.visits > 0 {
            root.q()
        } else {
            0.0
        }
    }

    pub fn root_state(&self) -> GameState {
        self.tree.root().state
    }

    /// `(move, visits)` for every root child, in generation order.
    pub fn root_children(&self) -> Vec<(Move, u64)> {
        let root = self.tree.root();
        (0..root.num_children as usize)
            .map(|i| {
                let n = self.tree.node(self.tree.child_index(self.tree.root_index(), i));
                (n.mv, n.visits)
            })
            .collect()
    }

    pub fn best_move(&self) -> Move {
        self.find_pv_move()
    }

    // ------------------------------------------------------------------
    // Main search
    // ------------------------------------------------------------------

    pub fn search(&mut self, params: &SearchParameters, limits: &SearchLimits) -> Move {
        debug_assert!(params.validate().is_ok());

        self.tree.switch_requested = false;
        self.node_count = 0;
        self.half_switches = 0;

        if !self.try_reuse_tree() {
            *self.tree.root_mut() = Node::default();
            let inactive = NodeIndex::new(0, self.tree.active_half() ^ 1);
            *self.tree.node_mut(inactive) = Node::default();
        }

        let root_board = self.root_board;
        let mut ctx = SearchContext {
            current_index: 1,
            seldepth: 0,
            pos_history: params.pos_history.clone(),
            history_base: 0,
            cpuct: params.cpuct,
            root_cpuct: params.root_cpuct,
            policy_temp: params.policy_temp,
            root_policy_temp: params.root_policy_temp,
        };
        ctx.pos_history.push(root_board.zobrist());
        ctx.history_base = ctx.pos_history.len();

        let budget = limits.time_budget();
        let mut iterations: u64 = 0;
        let mut report_timer = Instant::now();
        let mut last_depth = 0u64;
        let mut last_seldepth = 0u64;
        let mut last_move = Move::NULL;

        loop {
            ctx.pos_history.truncate(ctx.history_base);
            self.search_node(self.tree.root_index(), &root_board, &mut ctx, 0);

            if self.tree.switch_requested {
                self.half_swap(&mut ctx);
            }
            iterations += 1;

            if params.reporting == Reporting::Uci {
                let depth = self.node_count / iterations.max(1);
                let best = self.find_pv_move();
                if depth != last_depth
                    || ctx.seldepth != last_seldepth
                    || best != last_move
                    || report_timer.elapsed() >= UCI_REPORT_PERIOD
                {
                    self.print_uci_info(params, limits, &ctx, iterations);
                    last_depth = depth;
                    last_seldepth = ctx.seldepth;
                    last_move = best;
                    report_timer = Instant::now();
                }
            }
            if iterations % 256 == 0 {
                self.publish_status(limits, &ctx, iterations, false);
            }

            if self.should_stop(limits, iterations, budget) {
                break;
            }
        }

        let best = self.find_pv_move();

        match params.reporting {
            Reporting::Uci => {
                self.print_uci_info(params, limits, &ctx, iterations.max(1));
                println!("bestmove {best}");
            }
            Reporting::UciMinimal => println!("bestmove {best}"),
            Reporting::Silent => {}
        }
        self.publish_status(limits, &ctx, iterations.max(1), true);

        self.prev_root = Some(root_board);
        best
    }

    fn should_stop(&self, limits: &SearchLimits, iterations: u64, budget: i64) -> bool {
        if limits.mate && self.tree.root().is_terminal() {
            return true;
        }
        if self.stop.load(Ordering::Relaxed) {
            return true;
        }
        if budget > 0 && limits.elapsed_ms() >= budget {
            return true;
        }
        if limits.nodes > 0 && self.node_count >= limits.nodes {
            return true;
        }
        if limits.depth > 0 && self.tree.root().is_terminal() {
            // A proven root can never deepen; depth-limited searches would
            // spin forever otherwise.
            return true;
        }
        limits.depth > 0 && iterations > 0 && self.node_count / iterations >= limits.depth
    }

    // ------------------------------------------------------------------
    // One iteration
    // ------------------------------------------------------------------

    fn search_node(
        &mut self,
        idx: NodeIndex,
        board: &Board,
        ctx: &mut SearchContext,
        ply: u64,
    ) -> f32 {
        let node = *self.tree.node(idx);

        let score = if node.is_terminal() {
            self.evaluate_node(idx, board)
        } else if node.visits == 0 {
            // First visit: classify, then score the leaf.
            let state = classify(board, &ctx.pos_history);
            self.tree.node_mut(idx).state = state;
            self.evaluate_node(idx, board)
        } else {
            if node.num_children == 0 {
                self.expand_node(idx, board, ctx, ply);
            } else if node.first_child.half() != self.tree.active_half() {
                self.tree.copy_children(idx, &mut ctx.current_index);
            }

            // A switch request means expansion or copy aborted; leave the
            // iteration without touching any statistics.
            if self.tree.switch_requested || self.tree.node(idx).num_children == 0 {
                return 0.0;
            }

            let best = self.select_child(idx, board, ctx, ply);
            let mv = self.tree.node(best).mv;
            let next = board.child(mv);

            ctx.pos_history.push(next.zobrist());
            let score = -self.search_node(best, &next, ctx, ply + 1);
            ctx.pos_history.pop();

            self.butterfly.update(board.stm(), mv, score);
            self.propagate_terminal(idx, best);
            score
        };

        if self.tree.switch_requested {
            return 0.0;
        }

        {
            let n = self.tree.node_mut(idx);
            n.add_score(score);
            n.visits += 1;
        }
        self.node_count += 1;
        ctx.seldepth = ctx.seldepth.max(ply);

        let n = self.tree.node(idx);
        let (visits, q) = (n.visits, n.q());
        self.tree.cache.update(board.zobrist(), visits, q);

        score
    }

    fn evaluate_node(&self, idx: NodeIndex, board: &Board) -> f32 {
        match self.tree.node(idx).state.outcome() {
            Outcome::Draw => 0.0,
            Outcome::Win => 1.0,
            Outcome::Loss => -1.0,
            Outcome::Ongoing => {
                let entry = self.tree.cache.probe(board.zobrist());
                if entry.key == board.zobrist() {
                    entry.q
                } else {
                    cp_to_wdl(evaluate(board)) as f32
                }
            }
        }
    }

    fn expand_node(&mut self, idx: NodeIndex, board: &Board, ctx: &mut SearchContext, ply: u64) {
        let moves = board.legal_moves();
        // Mates are handled by classification; nothing to allocate.
        if moves.is_empty() {
            return;
        }

        let children: Vec<Node> = moves.iter().map(Node::new).collect();
        if !self.tree.allocate_children(idx, &children, &mut ctx.current_index) {
            return;
        }

        // Root priors are flattened harder to keep the search broad.
        let temperature = if ply == 0 { ctx.root_policy_temp } else { ctx.policy_temp };
        fill_policy(board, &mut self.tree, &self.butterfly, idx, temperature);
    }

    fn select_child(&self, parent: NodeIndex, board: &Board, ctx: &SearchContext, ply: u64) -> NodeIndex {
        let p = self.tree.node(parent);
        let cpuct = cpuct_for(p, ctx, ply == 0);
        let parent_score = cpuct * ((p.visits + 1) as f32).sqrt();

        let entry: CacheEntry = self.tree.cache.probe(board.zobrist());
        let fpu = if entry.key == board.zobrist() {
            entry.q
        } else {
            p.q()
        };

        let puct = |child: &Node| -> f32 {
            let exploit = if child.visits > 0 { -child.q() } else { fpu };
            exploit + child.policy() * parent_score / (child.visits + 1) as f32
        };

        // First argmax wins; children are scanned in storage order.
        let mut best = self.tree.child_index(parent, 0);
        let mut best_score = puct(self.tree.node(best));
        for i in 1..p.num_children as usize {
            let ci = self.tree.child_index(parent, i);
            let score = puct(self.tree.node(ci));
            if score > best_score {
                best_score = score;
                best = ci;
            }
        }
        best
    }


    /// Mate-distance propagation, separate from the WDL backup: a losing
    /// reply proves the parent won; only a full set of winning replies
    /// proves it lost.
    fn propagate_terminal(&mut self, parent: NodeIndex, _child: NodeIndex) {
        let (first, count) = {
            let p = self.tree.node(parent);
            (p.first_child, p.num_children as usize)
        };

        let mut shortest_win: Option<u16> = None;
        let mut longest_loss: u16 = 0;
        let mut all_win = true;

        for i in 0..count {
            let state = self
                .tree
                .node(NodeIndex::new(first.index() + i as u64, first.half()))
                .state;
            match state.outcome() {
                Outcome::Loss => {
                    let d = state.distance();
                    shortest_win = Some(shortest_win.map_or(d, |b| b.min(d)));
                    all_win = false;
                }
                Outcome::Win => longest_loss = longest_loss.max(state.distance()),
                _ => all_win = false,
            }
        }

        if let Some(d) = shortest_win {
            self.tree.node_mut(parent).state = GameState::win(d + 1);
        } else if all_win && count > 0 {
            self.tree.node_mut(parent).state = GameState::loss(longest_loss + 1);
        }
    }

    fn half_swap(&mut self, ctx: &mut SearchContext) {
        self.tree.switch_requested = false;

        let root = *self.tree.root();
        let keep_half = self.tree.active_half();
        let inactive = NodeIndex::new(0, keep_half ^ 1);
        *self.tree.node_mut(inactive) = root;
        self.tree.remove_refs(self.tree.root_index(), keep_half);

        ctx.current_index = 1;
        self.tree.switch_half();
        self.tree.copy_children(self.tree.root_index(), &mut ctx.current_index);
        self.half_switches += 1;
    }

    // ------------------------------------------------------------------
    // Tree reuse across successive root positions
    // ------------------------------------------------------------------

    fn try_reuse_tree(&mut self) -> bool {
        let Some(prev) = self.prev_root else {
            return false;
        };
        let root = *self.tree.root();
        if root.num_children == 0 {
            return false;
        }
        let old_half = self.tree.active_half();
        let target = self.root_board;

        let mut found: Option<NodeIndex> = None;
        if prev == target {
            found = Some(self.tree.root_index());
        }

        if found.is_none() {
            'outer: for i in 0..root.num_children as usize {
                let ci = self.tree.child_index(self.tree.root_index(), i);
                let child = *self.tree.node(ci);
                let pos1 = prev.child(child.mv);
                if pos1 == target {
                    found = Some(ci);
                    break;
                }
                for j in 0..child.num_children as usize {
                    let gi = self.tree.child_index(ci, j);
                    let gmv = self.tree.node(gi).mv;
                    if pos1.child(gmv) == target {
                        found = Some(gi);
                        break 'outer;
                    }
                }
            }
        }

        let Some(found) = found else {
            return false;
        };
        let promoted = *self.tree.node(found);
        if promoted.visits == 0 {
            return false;
        }

        self.tree.switch_half();
        *self.tree.root_mut() = promoted;
        // The freshly activated half is scratch space from index 1 on;
        // drop every edge that leads into it.
        self.tree.remove_refs(self.tree.root_index(), old_half);
        true
    }

    // ------------------------------------------------------------------
    // PV extraction and reporting
    // ------------------------------------------------------------------

    fn find_pv_move(&self) -> Move {
        let root = self.tree.root();
        if root.num_children == 0 {
            return Move::NULL;
        }
        let mut best_score = f32::NEG_INFINITY;
        let mut best = Move::NULL;
        for i in 0..root.num_children as usize {
            let child = self.tree.node(self.tree.child_index(self.tree.root_index(), i));
            let score = -adjusted_score(child);
            if score > best_score {
                best_score = score;
                best = child.mv;
            }
        }
        best
    }

    /// Best-score walk from `start` (or the root), across halves.
    fn find_pv(&self, start: Option<NodeIndex>) -> Vec<Move> {
        let mut pv = Vec::new();
        let mut idx = match start {
            Some(idx) => {
                pv.push(self.tree.node(idx).mv);
                idx
            }
            None => self.tree.root_index(),
        };

        while self.tree.node(idx).num_children > 0 && pv.len() < MAX_PV_LEN {
            let count = self.tree.node(idx).num_children as usize;
            let mut best_i = 0;
            let mut best_score = f32::NEG_INFINITY;
            for i in 0..count {
                let child = self.tree.node(self.tree.child_index(idx, i));
                let score = -adjusted_score(child);
                if score > best_score {
                    best_score = score;
                    best_i = i;
                }
            }
            let next = self.tree.child_index(idx, best_i);
            pv.push(self.tree.node(next).mv);
            idx = next;
        }
        pv
    }

    /// Root children sorted best-first for MultiPV reporting.
    fn sorted_root_children(&self) -> Vec<NodeIndex> {
        let root = self.tree.root();
        let mut children: Vec<NodeIndex> = (0..root.num_children as usize)
            .map(|i| self.tree.child_index(self.tree.root_index(), i))
            .collect();
        children.sort_by(|&a, &b| {
            let sa = -adjusted_score(self.tree.node(a));
            let sb = -adjusted_score(self.tree.node(b));
            sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
        });
        children
    }

    fn print_uci_info(
        &self,
        params: &SearchParameters,
        limits: &SearchLimits,
        ctx: &SearchContext,
        iterations: u64,
    ) {
        let children = self.sorted_root_children();
        let multipv = params.multipv.min(children.len().max(1));
        let time = limits.elapsed_ms().max(0) as u64;
        let depth = self.node_count / iterations.max(1);

        for (rank, &ci) in children.iter().take(multipv).enumerate() {
            let child = self.tree.node(ci);
            let mut line = format!(
                "info depth {} seldepth {} time {} nodes {}",
                depth, ctx.seldepth, time, self.node_count
            );
            if time > 0 {
                line.push_str(&format!(" nps {}", self.node_count * 1000 / time));
            }
            line.push_str(&format!(
                " hashfull {} hswitches {} multipv {}",
                self.tree.hashfull(ctx.current_index),
                self.half_switches,
                rank + 1
            ));
            match child.state.outcome() {
                Outcome::Ongoing | Outcome::Draw => {
                    line.push_str(&format!(" score cp {}", score_cp(-adjusted_score(child))));
                }
                _ => line.push_str(&format!(" score mate {}", child_mate_moves(child.state))),
            }
            line.push_str(" pv");
            for mv in self.find_pv(Some(ci)) {
                line.push_str(&format!(" {mv}"));
            }
            println!("{line}");
        }
    }

    fn publish_status(
        &self,
        limits: &SearchLimits,
        ctx: &SearchContext,
        iterations: u64,
        finished: bool,
    ) {
        let Some(sink) = &self.status else {
            return;
        };
        let elapsed = limits.elapsed_ms().max(0) as u64;
        let root = self.tree.root();
        let score = match root.state.outcome() {
            Outcome::Win => ScoreView::Mate((root.state.distance() as i32 + 1) / 2),
            Outcome::Loss => ScoreView::Mate(-((root.state.distance() as i32 + 1) / 2)),
            _ => ScoreView::Cp(score_cp(self.root_q())),
        };
        let snapshot = SearchStatus {
            depth: self.node_count / iterations.max(1),
            seldepth: ctx.seldepth,
            nodes: self.node_count,
            nps: self.node_count * 1000 / elapsed.max(1),
            elapsed_ms: elapsed,
            score,
            best_move: self.find_pv_move(),
            pv: self.find_pv(None),
            hashfull: self.tree.hashfull(ctx.current_index),
            cache_full: self.tree.cache.hashfull(),
            half_switches: self.half_switches,
            finished,
        };
        if let Ok(mut guard) = sink.lock() {
            *guard = snapshot;
        }
    }

    // ------------------------------------------------------------------
    // Single-shot fallback modes
    // ------------------------------------------------------------------

    /// Move straight from the policy head, no tree.
    pub fn search_policy(&mut self, report: bool) -> Move {
        let board = self.root_board;
        let moves = board.legal_moves();
        let mut best = Move::NULL;
        if !moves.is_empty() {
            let acc = PolicyAccumulator::new(&board);
            let mut best_logit = f32::NEG_INFINITY;
            for mv in moves.iter() {
                let logit = acc.logit(board.stm(), mv);
                if logit > best_logit {
                    best_logit = logit;
                    best = mv;
                }
            }
        }
        if report {
            println!("bestmove {best}");
        }
        best
    }

    /// Move straight from the value head: one-ply greedy search.
    pub fn search_value(&mut self, report: bool) -> Move {
        let board = self.root_board;
        let mut best = Move::NULL;
        let mut best_score = i32::MIN;
        for mv in board.legal_moves().iter() {
            let score = -evaluate(&board.child(mv));
            if score > best_score {
                best_score = score;
                best = mv;
            }
        }
        if report {
            println!("bestmove {best}");
        }
        best
    }

    /// Human-readable root children table for the `tree` command.
    pub fn render_root(&self) -> String {
        let mut out = String::new();
        let root = self.tree.root();
        out.push_str(&format!(
            "root: visits {} score {:+.3} state {:?}\n",
            root.visits,
            self.root_q(),
            root.state.outcome()
        ));
        for ci in self.sorted_root_children() {
            let child = self.tree.node(ci);
            let q = if child.visits > 0 { -child.q() } else { 0.0 };
            out.push_str(&format!(
                "  {:>5}  visits {:>10}  policy {:>5.3}  score {:+.3}  {:?}\n",
                child.mv.to_string(),
                child.visits,
                child.policy(),
                q,
                child.state.outcome()
            ));
        }
        out
    }
}

impl Default for Searcher {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_MB)
    }
}
