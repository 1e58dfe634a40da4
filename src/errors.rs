/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Error types surfaced by the chain.

use std::fmt::{self, Display, Formatter};
use std::io;

use crate::networking::RpcError;

/// Everything that can go wrong while verifying, persisting, or serving chain data.
///
/// Verification errors on incoming RPCs are returned to the caller, who decides whether to retry.
/// Broadcast errors are logged and dropped: dissemination may be lossy, since peers also pull
/// through block sync. Persistence errors abort the operation before any in-memory index is
/// touched, so the chain stays consistent.
#[derive(Debug)]
pub enum ChainError {
    /// Structural or parent check failure on an incoming block.
    InvalidBlock,
    /// The block producer is not in the peer set.
    UnknownProducer,
    /// The block producer is in the peer set but it is not its turn.
    InvalidProducer,
    /// A stored block names a parent that is not in the block index. Fatal at load.
    ParentNotFound,
    /// The persistent chain state is missing from the store. Fatal at load.
    StateNotFound,
    /// The query's response is older than `query_ttl` periods below the current head.
    QueryExpired,
    /// The referenced ack has already been committed by a different block.
    QuerySignedByAnotherBlock,
    /// The requested query artifact is in neither the memory index nor the store.
    QueryNotCached,
    /// A recomputed digest does not match the one carried by the artifact.
    HashVerification,
    /// A signature does not verify, or the signee is not the expected node.
    SignatureVerification,
    /// Unknown query type at the database layer embedding this chain.
    InvalidRequest,
    /// Storage quota reached; surfaced by the database write path.
    SpaceLimitExceeded,
    /// The chain has been stopped and no longer accepts work.
    Stopped,
    /// Borsh encoding or decoding failed.
    Codec(io::Error),
    /// A peer RPC failed.
    Rpc(RpcError),
}

impl Display for ChainError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::InvalidBlock => write!(f, "invalid block"),
            ChainError::UnknownProducer => write!(f, "unknown block producer"),
            ChainError::InvalidProducer => write!(f, "invalid block producer"),
            ChainError::ParentNotFound => write!(f, "previous block cannot be found"),
            ChainError::StateNotFound => write!(f, "chain state cannot be found"),
            ChainError::QueryExpired => write!(f, "query expired"),
            ChainError::QuerySignedByAnotherBlock => {
                write!(f, "query is already signed by another block")
            }
            ChainError::QueryNotCached => write!(f, "query is not cached"),
            ChainError::HashVerification => write!(f, "hash verification failed"),
            ChainError::SignatureVerification => write!(f, "signature verification failed"),
            ChainError::InvalidRequest => write!(f, "invalid request"),
            ChainError::SpaceLimitExceeded => write!(f, "space limit exceeded"),
            ChainError::Stopped => write!(f, "chain is stopped"),
            ChainError::Codec(err) => write!(f, "codec error: {}", err),
            ChainError::Rpc(err) => write!(f, "rpc error: {}", err),
        }
    }
}

impl std::error::Error for ChainError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChainError::Codec(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ChainError {
    fn from(err: io::Error) -> Self {
        ChainError::Codec(err)
    }
}

impl From<RpcError> for ChainError {
    fn from(err: RpcError) -> Self {
        ChainError::Rpc(err)
    }
}
