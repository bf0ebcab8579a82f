//! Turning raw policy logits into normalised child priors.

use crate::history::ButterflyHistory;
use crate::node::NodeIndex;
use crate::tree::Tree;
use tempest_core::Board;
use tempest_nets::PolicyAccumulator;

/// Score every child of `parent` with the policy head, soften by
/// `temperature`, normalise, and record the parent's gini impurity.
///
/// The children must already be allocated; their order is untouched.
pub fn fill_policy(
    board: &Board,
    tree: &mut Tree,
    history: &ButterflyHistory,
    parent: NodeIndex,
    temperature: f32,
) {
    let count = tree.node(parent).num_children as usize;
    if count == 0 {
        return;
    }

    let accumulator = PolicyAccumulator::new(board);
    let stm = board.stm();

    let mut scores = Vec::with_capacity(count);
    let mut max_score = f32::NEG_INFINITY;
    for i in 0..count {
        let mv = tree.node(tree.child_index(parent, i)).mv;
        let score = accumulator.logit(stm, mv) + history.policy_bonus(stm, mv);
        max_score = max_score.max(score);
        scores.push(score);
    }

    let mut sum = 0.0;
    for score in &mut scores {
        *score = ((*score - max_score) / temperature).exp();
        sum += *score;
    }

    let mut gini = 1.0;
    for (i, &score) in scores.iter().enumerate() {
        let p = score / sum;
        gini -= p * p;
        let idx = tree.child_index(parent, i);
        tree.node_mut(idx).set_policy(p);
    }
    tree.node_mut(parent).set_gini_impurity(gini);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use tempest_core::Move;

    fn expand_root(board: &Board, tree: &mut Tree) -> usize {
        let moves = board.legal_moves();
        let children: Vec<Node> = moves.iter().map(Node::new).collect();
        let mut current = 1u64;
        assert!(tree.allocate_children(tree.root_index(), &children, &mut current));
        moves.len()
    }

    fn root_priors(board: &Board, temperature: f32) -> Vec<(Move, f32)> {
        let mut tree = Tree::new(16);
        let history = ButterflyHistory::new();
        let count = expand_root(board, &mut tree);
        let root = tree.root_index();
        fill_policy(board, &mut tree, &history, root, temperature);
        (0..count)
            .map(|i| {
                let n = tree.node(tree.child_index(tree.root_index(), i));
                (n.mv, n.policy())
            })
            .collect()
    }

    #[test]
    fn priors_normalise_to_one_within_quantisation() {
        for fen_board in [Board::startpos(), Board::kiwipete()] {
            let priors = root_priors(&fen_board, 1.0);
            let sum: f32 = priors.iter().map(|(_, p)| p).sum();
            assert!(
                (sum - 1.0).abs() < 2.0 / 255.0 * priors.len() as f32 / 8.0 + 2.0 / 255.0,
                "sum {sum}"
            );
        }
    }

    #[test]
    fn low_temperature_sharpens_to_near_one_hot() {
        let board = Board::startpos();
        let cold = root_priors(&board, 0.01);
        let max = cold.iter().map(|(_, p)| *p).fold(0.0f32, f32::max);
        assert!(max > 0.95, "max prior {max} at t=0.01");
    }

    #[test]
    fn high_temperature_approaches_uniform() {
        let board = Board::startpos();
        let hot = root_priors(&board, 10.0);
        let uniform = 1.0 / hot.len() as f32;
        for (mv, p) in hot {
            assert!((p - uniform).abs() < 0.05, "{mv}: {p} vs {uniform}");
        }
    }

    #[test]
    fn gini_impurity_tracks_concentration() {
        let board = Board::startpos();
        let history = ButterflyHistory::new();

        let mut sharp = Tree::new(16);
        expand_root(&board, &mut sharp);
        let sharp_root = sharp.root_index();
        fill_policy(&board, &mut sharp, &history, sharp_root, 0.01);

        let mut flat = Tree::new(16);
        expand_root(&board, &mut flat);
        let flat_root = flat.root_index();
        fill_policy(&board, &mut flat, &history, flat_root, 10.0);

        assert!(sharp.root().gini_impurity() < flat.root().gini_impurity());
        assert!(flat.root().gini_impurity() <= 1.0);
    }

    #[test]
    fn history_bonus_shifts_the_distribution() {
        let board = Board::startpos();
        let favored = board.legal_moves().get(0);

        let mut plain = Tree::new(16);
        expand_root(&board, &mut plain);
        let plain_root = plain.root_index();
        fill_policy(&board, &mut plain, &ButterflyHistory::new(), plain_root, 1.0);
        let before = plain.node(plain.child_index(plain.root_index(), 0)).policy();

        let mut boosted_history = ButterflyHistory::new();
        for _ in 0..50 {
            boosted_history.update(board.stm(), favored, 0.99);
        }
        let mut boosted = Tree::new(16);
        expand_root(&board, &mut boosted);
        let boosted_root = boosted.root_index();
        fill_policy(&board, &mut boosted, &boosted_history, boosted_root, 1.0);
        let after = boosted.node(boosted.child_index(boosted.root_index(), 0)).policy();

        assert!(after > before, "history bonus should raise the prior ({before} -> {after})");
    }
}
