/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! In-memory index of responses and acknowledged queries per height.
//!
//! The index serves two masters. Block production drains it: every ack not yet committed by a
//! block is collected (and flagged) when the local node's turn comes. Block verification probes
//! it: each `queries` entry of an incoming block must name an ack the index holds.
//!
//! Acks are searched across every indexed height at or below the requested one, because a
//! produced block commits acks collected from *all* heights below the producing turn, not just
//! from the turn itself.
//!
//! A barrier height bounds the index from below; entries under heights below the barrier are
//! reclaimed and never come back, since the TTL check rejects anything that old on arrival.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::errors::ChainError;
use crate::types::basic::{BlockHeight, CryptoHash};
use crate::types::block::Block;
use crate::types::queries::{SignedAckHeader, SignedResponseHeader};

pub(crate) struct QueryIndex {
    inner: Mutex<Inner>,
}

struct Inner {
    barrier: BlockHeight,
    heights: BTreeMap<BlockHeight, HeightIndex>,
}

#[derive(Default)]
struct HeightIndex {
    responses: HashMap<CryptoHash, SignedResponseHeader>,
    acks: HashMap<CryptoHash, AckState>,
}

struct AckState {
    ack: SignedAckHeader,
    /// Set when the local producer collects this ack into a block it is packing.
    signed: bool,
    /// Set when a block committing this ack is accepted onto the main chain.
    signed_block: Option<CryptoHash>,
}

impl QueryIndex {
    pub(crate) fn new() -> QueryIndex {
        QueryIndex {
            inner: Mutex::new(Inner {
                barrier: BlockHeight::new(i32::MIN),
                heights: BTreeMap::new(),
            }),
        }
    }

    /// Insert a response under `height`. Duplicates collapse silently.
    pub(crate) fn add_response(&self, height: BlockHeight, resp: &SignedResponseHeader) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .heights
            .entry(height)
            .or_default()
            .responses
            .entry(resp.hash)
            .or_insert_with(|| resp.clone());
    }

    /// Insert an ack under `height`. Duplicates collapse silently, keeping their bookkeeping.
    pub(crate) fn add_ack(&self, height: BlockHeight, ack: &SignedAckHeader) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .heights
            .entry(height)
            .or_default()
            .acks
            .entry(ack.hash)
            .or_insert_with(|| AckState {
                ack: ack.clone(),
                signed: false,
                signed_block: None,
            });
    }

    /// Atomically collect the hash of every unsigned ack at heights below `current_turn` and
    /// flag each as signed. Called once per produced block; an immediate second call with the
    /// same turn returns the empty list.
    ///
    /// Hashes are returned grouped by ascending height, sorted within a height, so the wire image
    /// of a produced block is stable.
    pub(crate) fn mark_and_collect_unsigned_acks(
        &self,
        current_turn: BlockHeight,
    ) -> Vec<CryptoHash> {
        let mut inner = self.inner.lock().unwrap();
        let mut collected = Vec::new();
        for (_, index) in inner.heights.range_mut(..current_turn) {
            let mut at_height: Vec<CryptoHash> = index
                .acks
                .iter_mut()
                .filter(|(_, state)| !state.signed)
                .map(|(hash, state)| {
                    state.signed = true;
                    *hash
                })
                .collect();
            at_height.sort_by_key(|hash| hash.bytes());
            collected.extend(at_height);
        }
        collected
    }

    /// Check whether the ack named by a block's `queries` entry is present at some height at or
    /// below `height`. An ack already committed by a different block is an error.
    pub(crate) fn check_ack_from_block(
        &self,
        height: BlockHeight,
        block: &CryptoHash,
        ack: &CryptoHash,
    ) -> Result<bool, ChainError> {
        let inner = self.inner.lock().unwrap();
        for (_, index) in inner.heights.range(..=height).rev() {
            if let Some(state) = index.acks.get(ack) {
                if let Some(signed_block) = &state.signed_block {
                    if signed_block != block {
                        return Err(ChainError::QuerySignedByAnotherBlock);
                    }
                }
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Bind every ack committed by an accepted `block` at `height` to the block's hash, marking
    /// it signed so later turns do not commit it again.
    pub(crate) fn set_signed_block(&self, height: BlockHeight, block: &Block) {
        let mut inner = self.inner.lock().unwrap();
        let block_hash = block.hash();
        for query in &block.queries {
            for (_, index) in inner.heights.range_mut(..=height).rev() {
                if let Some(state) = index.acks.get_mut(query) {
                    state.signed = true;
                    state.signed_block = Some(block_hash);
                    break;
                }
            }
        }
    }

    /// Look up an ack by hash at any height at or below `height`.
    pub(crate) fn get_ack(
        &self,
        height: BlockHeight,
        hash: &CryptoHash,
    ) -> Option<SignedAckHeader> {
        let inner = self.inner.lock().unwrap();
        for (_, index) in inner.heights.range(..=height).rev() {
            if let Some(state) = index.acks.get(hash) {
                return Some(state.ack.clone());
            }
        }
        None
    }

    /// Reclaim every height below `min_valid_height`.
    pub(crate) fn advance_barrier(&self, min_valid_height: BlockHeight) {
        let mut inner = self.inner.lock().unwrap();
        if min_valid_height <= inner.barrier {
            return;
        }
        let kept = inner.heights.split_off(&min_valid_height);
        inner.heights = kept;
        inner.barrier = min_valid_height;
    }
}
