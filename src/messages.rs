/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the messages that peers of a SQL-chain exchange.
//!
//! All messages are borsh-encoded; field order in the struct definitions below is the normative
//! wire order. Every request opens with an [`Envelope`] and the [`DatabaseId`] of the chain it
//! addresses, so that a multiplexing transport can dispatch it.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::basic::{BlockHeight, CryptoHash, DatabaseId, NodeId};
use crate::types::block::Block;
use crate::types::queries::SignedAckHeader;

/// Version tag carried by every request envelope.
pub const ENVELOPE_VERSION: u32 = 1;

/// Transport-level preamble of every request: protocol version and originating node.
#[derive(Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Envelope {
    pub version: u32,
    pub origin: NodeId,
}

impl Envelope {
    /// Create an `Envelope` originating from `origin`.
    pub fn new(origin: NodeId) -> Envelope {
        Envelope {
            version: ENVELOPE_VERSION,
            origin,
        }
    }
}

/// Pushes a freshly produced block to a peer. Fire-and-forget: delivery failures are tolerated
/// because peers also pull missing blocks through [`FetchBlockReq`].
#[derive(Clone, BorshSerialize, BorshDeserialize)]
pub struct AdviseNewBlockReq {
    pub envelope: Envelope,
    pub database_id: DatabaseId,
    pub block: Block,
}

#[derive(Clone, Default, BorshSerialize, BorshDeserialize)]
pub struct AdviseNewBlockResp {}

/// Asks a peer for the main-chain block at `height`.
#[derive(Clone, BorshSerialize, BorshDeserialize)]
pub struct FetchBlockReq {
    pub envelope: Envelope,
    pub database_id: DatabaseId,
    pub height: BlockHeight,
}

#[derive(Clone, BorshSerialize, BorshDeserialize)]
pub struct FetchBlockResp {
    pub block: Option<Block>,
}

/// Asks a peer for the acknowledged query named by a block's `queries` entry.
#[derive(Clone, BorshSerialize, BorshDeserialize)]
pub struct FetchAckedQueryReq {
    pub envelope: Envelope,
    pub database_id: DatabaseId,
    pub height: BlockHeight,
    pub header_hash: CryptoHash,
}

#[derive(Clone, BorshSerialize, BorshDeserialize)]
pub struct FetchAckedQueryResp {
    pub ack: SignedAckHeader,
}
