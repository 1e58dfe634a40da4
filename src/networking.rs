/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Trait definitions for pluggable peer-to-peer RPC.
//!
//! The chain has modular networking, with each peer reachable by its [`NodeId`]. Transport
//! providers interact with the chain through two seams:
//! 1. [`ChainRpc`] is the client side: how the chain calls out to its peers. Implementations
//!    wrap whatever transport the deployment uses (the production service multiplexes
//!    per-database chains behind `<service>.<method>`-style routes).
//! 2. [`ChainService`] is the serving side: what a transport dispatches inbound requests to.
//!    Every chain hands out such a handle through [`Chain::service`](crate::chain::Chain::service).

use std::fmt::{self, Display, Formatter};

use crate::errors::ChainError;
use crate::messages::{
    AdviseNewBlockReq, AdviseNewBlockResp, FetchAckedQueryReq, FetchAckedQueryResp, FetchBlockReq,
    FetchBlockResp,
};
use crate::types::basic::NodeId;

/// The client side of the chain's RPC surface.
///
/// Calls are synchronous request/response exchanges with a single peer. Implementations must be
/// cheaply cloneable (the chain clones its handle into transient broadcast workers) and safe to
/// share between the chain's threads.
pub trait ChainRpc: Clone + Send + Sync + 'static {
    /// Push a freshly produced block to `peer`.
    fn advise_new_block(
        &self,
        peer: &NodeId,
        req: AdviseNewBlockReq,
    ) -> Result<AdviseNewBlockResp, RpcError>;

    /// Ask `peer` for the main-chain block at the requested height.
    fn fetch_block(&self, peer: &NodeId, req: FetchBlockReq) -> Result<FetchBlockResp, RpcError>;

    /// Ask `peer` for an acknowledged query by header hash.
    fn fetch_acked_query(
        &self,
        peer: &NodeId,
        req: FetchAckedQueryReq,
    ) -> Result<FetchAckedQueryResp, RpcError>;
}

/// The serving side of the chain's RPC surface.
///
/// Object-safe so that a multiplexing transport can hold one `Arc<dyn ChainService>` per
/// database.
pub trait ChainService: Send + Sync {
    /// Accept a block advised by a peer; it is verified asynchronously by the block pipeline.
    fn advise_new_block(&self, req: AdviseNewBlockReq) -> Result<AdviseNewBlockResp, ChainError>;

    /// Serve the main-chain block at the requested height, if there is one.
    fn fetch_block(&self, req: FetchBlockReq) -> Result<FetchBlockResp, ChainError>;

    /// Serve an acknowledged query from the memory index or the store.
    fn fetch_acked_query(&self, req: FetchAckedQueryReq)
        -> Result<FetchAckedQueryResp, ChainError>;
}

/// Error when calling out to a peer.
#[derive(Debug)]
pub enum RpcError {
    /// The transport has no route to the peer.
    PeerNotFound,
    /// The peer was reached but the call failed; the message carries the remote error.
    Remote(String),
}

impl Display for RpcError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::PeerNotFound => write!(f, "peer not found"),
            RpcError::Remote(message) => write!(f, "remote error: {}", message),
        }
    }
}

impl std::error::Error for RpcError {}
