/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The ordered set of peers replicating one SQL-chain.

use std::slice;

use borsh::{BorshDeserialize, BorshSerialize};

use super::basic::{BlockHeight, NodeId};

/// Stores the identities of a chain's peers, in rotation order.
///
/// ## Ordering of peers
///
/// The order of the list is normative: the producer expected at height `h` is the peer at
/// position `h mod len`. The list is therefore kept exactly as configured, never sorted.
#[derive(Clone, Debug, PartialEq, Eq, Default, BorshSerialize, BorshDeserialize)]
pub struct PeerSet {
    peers: Vec<NodeId>,
}

impl PeerSet {
    /// Create a `PeerSet` with the given rotation order.
    pub fn new(peers: Vec<NodeId>) -> PeerSet {
        Self { peers }
    }

    /// Get the number of peers in the set.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Check whether the peer set is empty (i.e., `self.len() == 0`).
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Check whether the peer set contains `peer`.
    pub fn contains(&self, peer: &NodeId) -> bool {
        self.peers.contains(peer)
    }

    /// Get the rotation position of `peer`, if it is actually in the peer set.
    pub fn position(&self, peer: &NodeId) -> Option<usize> {
        self.peers.iter().position(|p| p == peer)
    }

    /// Get the peer expected to produce the block at `height`, or `None` on an empty set.
    pub fn producer_at(&self, height: BlockHeight) -> Option<NodeId> {
        if self.peers.is_empty() {
            return None;
        }
        let index = height % self.peers.len() as i32;
        Some(self.peers[index as usize])
    }

    /// Get an iterator through the peers in rotation order.
    pub fn iter(&self) -> slice::Iter<'_, NodeId> {
        self.peers.iter()
    }
}
