/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Configuration of a [`Chain`](crate::chain::Chain) instance.

use std::time::Duration;

use crate::types::basic::{DatabaseId, NodeId};
use crate::types::block::Block;
use crate::types::Keypair;
use crate::types::peer_set::PeerSet;

/// Length of a production period in the standard deployment.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(60);

/// Sleep granularity of the main cycle in the standard deployment.
pub const DEFAULT_TICK: Duration = Duration::from_secs(10);

/// Number of periods an acknowledged query stays acceptable below the head in the standard
/// deployment.
pub const DEFAULT_QUERY_TTL: i32 = 10;

/// Immutable parameters that define a chain instance.
#[derive(Clone)]
pub struct Configuration {
    /// The database instance this chain records history for.
    pub database_id: DatabaseId,

    /// The chain's verified genesis block. Fixes the chain's identity and time origin.
    pub genesis: Block,

    /// The peers replicating this chain, in rotation order.
    pub peers: PeerSet,

    /// The local node's identity. Must match `keypair`'s public key for block production to
    /// succeed.
    pub server: NodeId,

    /// The local node's signing key.
    pub keypair: Keypair,

    /// Length of one production period.
    pub period: Duration,

    /// Sleep granularity of the main cycle; bounds how long a shutdown request can go unnoticed.
    pub tick: Duration,

    /// Number of periods below the head within which acknowledged queries are still accepted.
    pub query_ttl: i32,
}
