/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Transactional on-disk persistence of chain state, blocks, and per-height query artifacts.
//!
//! The chain persists into an embedded key-value store reached through the pluggable
//! [`KVStore`] seam. All values are borsh-encoded, laid out in the byte-prefix namespaces defined
//! in [`variables`]:
//!
//! ```text
//! state                              → State
//! block-index/<block_hash>           → Block
//! height-index/<height-be32>/
//!     request-index/<request_hash>   → RequestHeader
//!     response-index/<header_hash>   → SignedResponseHeader
//!     ack-index/<header_hash>        → SignedAckHeader
//! ```
//!
//! Height keys are big-endian 4-byte encodings of the height so that lexicographic iteration is
//! chronological. Each [`BlockStore`] operation stages all of its writes into one
//! [`WriteBatch`]; the batch applies atomically, so readers never observe a half-updated state
//! and a crash leaves the state key and the most recently written block either both present or
//! both absent.

pub mod pluggables;

pub(crate) mod variables;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::errors::ChainError;
use crate::types::basic::{BlockHeight, CryptoHash};
use crate::types::block::Block;
use crate::types::queries::{SignedAckHeader, SignedResponseHeader};

pub use pluggables::{KVGet, KVStore, WriteBatch};

use self::variables::{ack_key, block_key, request_key, response_key, split_height_entry, STATE};

/// The persistent singleton naming the current head of the main chain.
#[derive(Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct State {
    pub head: CryptoHash,
    pub height: BlockHeight,
}

/// Chain persistence over a pluggable key-value store.
#[derive(Clone)]
pub struct BlockStore<K: KVStore> {
    kv: K,
}

impl<K: KVStore> BlockStore<K> {
    /// Create a `BlockStore` over `kv`. The key space needs no initialization; namespaces are
    /// plain key prefixes.
    pub fn new(kv: K) -> BlockStore<K> {
        BlockStore { kv }
    }

    /// Write `state` and `block` in one atomic batch, extending the persistent main chain.
    pub fn put_block(&self, block: &Block, state: &State) -> Result<(), ChainError> {
        let mut wb = K::WriteBatch::new();
        wb.set(&STATE, &state.try_to_vec()?);
        wb.set(&block_key(&block.hash()), &block.try_to_vec()?);
        self.kv.write(wb);
        Ok(())
    }

    /// Write a signed response header under `height`, together with its embedded request header.
    /// Idempotent on duplicate keys.
    pub fn put_response(
        &self,
        height: BlockHeight,
        resp: &SignedResponseHeader,
    ) -> Result<(), ChainError> {
        let request = &resp.response.request;
        let mut wb = K::WriteBatch::new();
        wb.set(
            &request_key(height, &request.compute_hash()),
            &request.try_to_vec()?,
        );
        wb.set(&response_key(height, &resp.hash), &resp.try_to_vec()?);
        self.kv.write(wb);
        Ok(())
    }

    /// Write a signed ack header under `height`. Idempotent on duplicate keys.
    pub fn put_ack(&self, height: BlockHeight, ack: &SignedAckHeader) -> Result<(), ChainError> {
        let mut wb = K::WriteBatch::new();
        wb.set(&ack_key(height, &ack.hash), &ack.try_to_vec()?);
        self.kv.write(wb);
        Ok(())
    }

    /// Read the persistent chain state, if the store has ever been written.
    pub fn get_state(&self) -> Result<Option<State>, ChainError> {
        match self.kv.get(&STATE) {
            Some(bytes) => Ok(Some(State::try_from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Point-read a block by hash.
    pub fn get_block(&self, hash: &CryptoHash) -> Result<Option<Block>, ChainError> {
        match self.kv.get(&block_key(hash)) {
            Some(bytes) => Ok(Some(Block::try_from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Point-read a signed ack header by height and hash.
    pub fn get_ack(
        &self,
        height: BlockHeight,
        hash: &CryptoHash,
    ) -> Result<Option<SignedAckHeader>, ChainError> {
        match self.kv.get(&ack_key(height, hash)) {
            Some(bytes) => Ok(Some(SignedAckHeader::try_from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Decode every stored block. Used only at load time; ordering is by key (block hash), so
    /// callers re-order by derived height.
    pub fn blocks(&self) -> Result<Vec<Block>, ChainError> {
        self.kv
            .iter_prefix(&variables::BLOCK_INDEX)
            .into_iter()
            .map(|(_, bytes)| Block::try_from_slice(&bytes).map_err(ChainError::from))
            .collect()
    }

    /// Decode every stored response and ack, grouped under the height each was written at, in
    /// chronological order. Used only at load time.
    pub fn queries_by_height(&self) -> Result<Vec<HeightQueries>, ChainError> {
        let mut out: Vec<HeightQueries> = Vec::new();
        for (key, bytes) in self.kv.iter_prefix(&variables::HEIGHT_INDEX) {
            let (height, namespace) = match split_height_entry(&key) {
                Some(parts) => parts,
                None => continue,
            };
            if out.last().map(|entry| entry.height) != Some(height) {
                out.push(HeightQueries {
                    height,
                    responses: Vec::new(),
                    acks: Vec::new(),
                });
            }
            let entry = out.last_mut().unwrap();
            match namespace {
                variables::RESPONSE_INDEX => {
                    entry.responses.push(SignedResponseHeader::try_from_slice(&bytes)?)
                }
                variables::ACK_INDEX => entry.acks.push(SignedAckHeader::try_from_slice(&bytes)?),
                _ => (),
            }
        }
        Ok(out)
    }
}

/// The query artifacts stored under one height.
pub struct HeightQueries {
    pub height: BlockHeight,
    pub responses: Vec<SignedResponseHeader>,
    pub acks: Vec<SignedAckHeader>,
}
