/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A per-database **SQL-chain**: a replicated, time-sliced blockchain whose blocks commit client
//! query activity, with block production rotating deterministically over a fixed peer set.
//!
//! Each database instance owns one [`Chain`](chain::Chain). Wall-clock time since the genesis
//! block is divided into fixed periods ("turns"); the peer at `height mod n` in the configured
//! [`PeerSet`](types::peer_set::PeerSet) is expected to produce the block for each turn. Blocks
//! commit the content hashes of client-signed acknowledgements
//! ([`SignedAckHeader`](types::queries::SignedAckHeader)s) of server responses, giving every peer
//! a cryptographic commitment to the canonical query history.
//!
//! Persistence is pluggable through the [`KVStore`](store::KVStore) seam, and the peer-to-peer
//! transport is pluggable through the [`ChainRpc`](networking::ChainRpc) seam; embedders bind
//! their storage engine and RPC multiplexer to these traits.

pub mod chain;

pub mod config;

pub mod errors;

pub mod messages;

pub mod networking;

pub mod store;

pub mod types;

pub(crate) mod block_index;

pub(crate) mod logging;

pub(crate) mod query_index;

pub(crate) mod runtime;

// Re-exports
pub use chain::{Chain, ChainHead};
pub use config::Configuration;
pub use errors::ChainError;
