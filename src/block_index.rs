/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! In-memory index of the blocks of a chain, keyed by hash.
//!
//! Nodes live in an arena and reference their parent by index rather than by owning pointer, so
//! one parent can have any number of children (forks) without cyclic ownership. The main chain is
//! the path from the head node back to the genesis.

use std::collections::HashMap;

use crate::types::basic::{BlockHeight, CryptoHash};
use crate::types::block::Block;

/// Position of a [`BlockNode`] in the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct NodeIndex(usize);

/// One indexed block: its derived height, hash, parent link, and the decoded block itself.
pub(crate) struct BlockNode {
    pub(crate) height: BlockHeight,
    pub(crate) hash: CryptoHash,
    pub(crate) parent: Option<NodeIndex>,
    pub(crate) block: Block,
}

pub(crate) struct BlockIndex {
    nodes: Vec<BlockNode>,
    by_hash: HashMap<CryptoHash, NodeIndex>,
}

impl BlockIndex {
    pub(crate) fn new() -> BlockIndex {
        BlockIndex {
            nodes: Vec::new(),
            by_hash: HashMap::new(),
        }
    }

    /// Insert a block with the given derived `height` and `parent` link. Idempotent by hash: a
    /// block that is already indexed keeps its existing node.
    pub(crate) fn insert(
        &mut self,
        height: BlockHeight,
        block: Block,
        parent: Option<NodeIndex>,
    ) -> NodeIndex {
        let hash = block.hash();
        if let Some(index) = self.by_hash.get(&hash) {
            return *index;
        }
        let index = NodeIndex(self.nodes.len());
        self.nodes.push(BlockNode {
            height,
            hash,
            parent,
            block,
        });
        self.by_hash.insert(hash, index);
        index
    }

    /// Look up the node index of a block hash.
    pub(crate) fn position(&self, hash: &CryptoHash) -> Option<NodeIndex> {
        self.by_hash.get(hash).copied()
    }

    pub(crate) fn node(&self, index: NodeIndex) -> &BlockNode {
        &self.nodes[index.0]
    }

    /// Walk parent links from `from` until reaching the node at `height`. Returns `None` if the
    /// walk runs past the root first, or if `height` is above the starting node.
    pub(crate) fn ancestor(&self, from: NodeIndex, height: BlockHeight) -> Option<&BlockNode> {
        let mut current = self.node(from);
        loop {
            if current.height == height {
                return Some(current);
            }
            if current.height < height {
                return None;
            }
            current = self.node(current.parent?);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }
}
