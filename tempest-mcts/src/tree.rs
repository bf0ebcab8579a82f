//! The node arena: two equal halves with a copy-on-use protocol.
//!
//! Allocation only ever moves forward inside the active half. When the
//! active half fills up, the searcher asks for a half switch: the root is
//! copied across, the stale half becomes scratch space, and the previous
//! root block stays readable for tree reuse.

use crate::cache::LeafCache;
use crate::node::{Node, NodeIndex};

pub const DEFAULT_HASH_MB: usize = 16;

pub struct Tree {
    halves: [Vec<Node>; 2],
    active: u8,
    pub switch_requested: bool,
    pub cache: LeafCache,
}

impl Tree {
    pub fn new(size_mb: usize) -> Self {
        let mut tree = Self {
            halves: [Vec::new(), Vec::new()],
            active: 0,
            switch_requested: false,
            cache: LeafCache::new(size_mb.max(16) / 16),
        };
        tree.resize(size_mb);
        tree
    }

    /// Re-split `size_mb`: 15/16 to the two node halves, 1/16 to the leaf
    /// cache. Drops all stored search state.
    pub fn resize(&mut self, size_mb: usize) {
        let node_bytes = size_mb * 1024 * 1024 / 16 * 15;
        let per_half = (node_bytes / std::mem::size_of::<Node>() / 2).max(2);
        self.halves[0] = vec![Node::default(); per_half];
        self.halves[1] = vec![Node::default(); per_half];
        self.active = 0;
        self.switch_requested = false;
        self.cache.resize((size_mb / 16).max(1));
    }

    /// Forget everything searched so far; keeps the allocation.
    pub fn reset(&mut self) {
        self.halves[0][0] = Node::default();
        self.halves[1][0] = Node::default();
        self.switch_requested = false;
        self.cache.clear();
    }

    #[inline]
    pub fn active_half(&self) -> u8 {
        self.active
    }

    #[inline]
    pub fn switch_half(&mut self) {
        self.active ^= 1;
    }

    #[inline]
    pub fn half_len(&self) -> usize {
        self.halves[0].len()
    }

    #[inline]
    pub fn root_index(&self) -> NodeIndex {
        NodeIndex::new(0, self.active)
    }

    #[inline]
    pub fn root(&self) -> &Node {
        &self.halves[self.active as usize][0]
    }

    #[inline]
    pub fn root_mut(&mut self) -> &mut Node {
        &mut self.halves[self.active as usize][0]
    }

    #[inline]
    pub fn node(&self, idx: NodeIndex) -> &Node {
        &self.halves[idx.half() as usize][idx.index() as usize]
    }

    #[inline]
    pub fn node_mut(&mut self, idx: NodeIndex) -> &mut Node {
        &mut self.halves[idx.half() as usize][idx.index() as usize]
    }

    /// Index of the `i`-th child of `parent`.
    #[inline]
    pub fn child_index(&self, parent: NodeIndex, i: usize) -> NodeIndex {
        let first = self.node(parent).first_child;
        NodeIndex::new(first.index() + i as u64, first.half())
    }

    /// Write a fresh block of `children` at `*current_index` in the active
    /// half and point `parent` at it. Requests a half switch instead when
    /// the block does not fit.
    pub fn allocate_children(
        &mut self,
        parent: NodeIndex,
        children: &[Node],
        current_index: &mut u64,
    ) -> bool {
        if *current_index as usize + children.len() >= self.half_len() {
            self.switch_requested = true;
            return false;
        }
        let half = self.active as usize;
        let base = *current_index as usize;
        self.halves[half][base..base + children.len()].copy_from_slice(children);

        let parent = self.node_mut(parent);
        parent.first_child = NodeIndex::new(base as u64, half as u8);
        parent.num_children = children.len() as u8;
        *current_index += children.len() as u64;
        true
    }

    /// Deep-copy the immediate child block of `parent` (wherever it lives)
    /// into the active half at `*current_index`. Requests a half switch
    /// instead when the block does not fit.
    pub fn copy_children(&mut self, parent: NodeIndex, current_index: &mut u64) {
        let (first, count) = {
            let p = self.node(parent);
            (p.first_child, p.num_children as usize)
        };

        if *current_index as usize + count > self.half_len() {
            self.switch_requested = true;
            return;
        }

        let block: Vec<Node> = (0..count)
            .map(|i| *self.node(NodeIndex::new(first.index() + i as u64, first.half())))
            .collect();

        let half = self.active as usize;
        let base = *current_index as usize;
        self.halves[half][base..base + count].copy_from_slice(&block);

        let p = self.node_mut(parent);
        p.first_child = NodeIndex::new(base as u64, half as u8);
        *current_index += count as u64;
    }

    /// Sever every edge from the subtree under `idx` into the half that is
    /// about to be overwritten, keeping only chains inside `keep_half`.
    pub fn remove_refs(&mut self, idx: NodeIndex, keep_half: u8) {
        let (first, count) = {
            let n = self.node(idx);
            if n.num_children == 0 {
                return;
            }
            (n.first_child, n.num_children as usize)
        };
        if first.half() != keep_half {
            self.node_mut(idx).num_children = 0;
            return;
        }
        for i in 0..count {
            self.remove_refs(NodeIndex::new(first.index() + i as u64, first.half()), keep_half);
        }
    }

    /// Tree occupancy in permil of the active half, as reported over UCI.
    pub fn hashfull(&self, current_index: u64) -> u64 {
        current_index * 1000 / self.half_len() as u64
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_MB)
    }
}
