/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The keys of the chain's persistent state variables.
//!
//! Namespaces are single-byte key prefixes. Under the height index, keys are laid out as
//! `HEIGHT_INDEX ++ height_be32 ++ namespace_byte ++ artifact_hash`, so one lexicographic sweep
//! of the height index visits heights chronologically and, within a height, requests before
//! responses before acks.

use crate::types::basic::{BlockHeight, CryptoHash};

/// The persistent [`State`](super::State) singleton.
pub(crate) const STATE: [u8; 1] = [0];

/// Block hash → encoded block.
pub(crate) const BLOCK_INDEX: [u8; 1] = [1];

/// Height → per-height query artifacts.
pub(crate) const HEIGHT_INDEX: [u8; 1] = [2];

// Sub-namespaces under a height:
pub(crate) const REQUEST_INDEX: u8 = 0;
pub(crate) const RESPONSE_INDEX: u8 = 1;
pub(crate) const ACK_INDEX: u8 = 2;

pub(crate) fn block_key(hash: &CryptoHash) -> Vec<u8> {
    concat(&BLOCK_INDEX, &hash.bytes())
}

pub(crate) fn request_key(height: BlockHeight, hash: &CryptoHash) -> Vec<u8> {
    height_entry_key(height, REQUEST_INDEX, hash)
}

pub(crate) fn response_key(height: BlockHeight, hash: &CryptoHash) -> Vec<u8> {
    height_entry_key(height, RESPONSE_INDEX, hash)
}

pub(crate) fn ack_key(height: BlockHeight, hash: &CryptoHash) -> Vec<u8> {
    height_entry_key(height, ACK_INDEX, hash)
}

fn height_entry_key(height: BlockHeight, namespace: u8, hash: &CryptoHash) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 4 + 1 + 32);
    key.extend_from_slice(&HEIGHT_INDEX);
    key.extend_from_slice(&height.to_be_bytes());
    key.push(namespace);
    key.extend_from_slice(&hash.bytes());
    key
}

/// Parse a height-index key back into its height and sub-namespace byte. Returns `None` on keys
/// that do not have the height-entry layout.
pub(crate) fn split_height_entry(key: &[u8]) -> Option<(BlockHeight, u8)> {
    if key.len() != 1 + 4 + 1 + 32 || key[0] != HEIGHT_INDEX[0] {
        return None;
    }
    let mut height_bytes = [0u8; 4];
    height_bytes.copy_from_slice(&key[1..5]);
    Some((BlockHeight::from_be_bytes(height_bytes), key[5]))
}

pub(crate) fn concat(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(a.len() + b.len());
    key.extend_from_slice(a);
    key.extend_from_slice(b);
    key
}
