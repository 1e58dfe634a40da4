//! Shared harness for the integration tests: in-memory persistence, a local RPC registry, and a
//! node wrapper that builds genesis, configuration, and chain for each peer.

pub(crate) mod logging;
pub(crate) mod mem_db;
pub(crate) mod network;

use std::time::{Duration, Instant};

use rand_core::OsRng;

use sqlchain_rs::config::Configuration;
use sqlchain_rs::types::basic::{CryptoHash, DatabaseId, NodeId, QueryId, Timestamp};
use sqlchain_rs::types::block::{self, Block};
use sqlchain_rs::types::{Keypair, SigningKey};
use sqlchain_rs::types::peer_set::PeerSet;
use sqlchain_rs::types::queries::{
    AckHeader, RequestHeader, ResponseHeader, SignedAckHeader, SignedResponseHeader,
};
use sqlchain_rs::Chain;

use mem_db::MemDB;
use network::RpcStub;

pub(crate) struct Node {
    pub(crate) id: NodeId,
    pub(crate) keypair: Keypair,
    pub(crate) chain: Chain<MemDB, RpcStub>,
}

pub(crate) fn make_keypairs(count: usize) -> Vec<Keypair> {
    (0..count)
        .map(|_| Keypair::new(SigningKey::generate(&mut OsRng)))
        .collect()
}

pub(crate) fn make_configuration(
    keypair: &Keypair,
    genesis: &Block,
    peers: &PeerSet,
    period: Duration,
    query_ttl: i32,
) -> Configuration {
    Configuration {
        database_id: DatabaseId::new("db-test".to_string()),
        genesis: genesis.clone(),
        peers: peers.clone(),
        server: keypair.node_id(),
        keypair: keypair.clone(),
        period,
        tick: Duration::from_millis(100),
        query_ttl,
    }
}

/// Build one node per keypair over a shared mock transport, with the first keypair as the
/// bootstrap producer of the genesis block. `running` limits which of the peers actually get a
/// chain; the others stay unreachable. All chains are registered before any is started.
pub(crate) fn start_nodes(
    keypairs: &[Keypair],
    running: usize,
    genesis_time: Timestamp,
    period: Duration,
    query_ttl: i32,
) -> (Vec<Node>, RpcStub) {
    let genesis = block::genesis(genesis_time, &keypairs[0]);
    let peers = PeerSet::new(
        keypairs
            .iter()
            .map(|keypair| keypair.node_id())
            .collect(),
    );
    let rpc = RpcStub::new();

    let mut nodes: Vec<Node> = keypairs
        .iter()
        .take(running)
        .map(|keypair| {
            let config = make_configuration(keypair, &genesis, &peers, period, query_ttl);
            let chain = Chain::new(config, MemDB::new(), rpc.clone()).unwrap();
            let id = keypair.node_id();
            rpc.register(id, chain.service());
            Node {
                id,
                keypair: keypair.clone(),
                chain,
            }
        })
        .collect();

    for node in nodes.iter_mut() {
        node.chain.start();
    }
    (nodes, rpc)
}

/// A worker-signed, client-signed acknowledged query whose response was produced at
/// `response_time`.
pub(crate) fn make_ack(
    worker: &Keypair,
    client: &Keypair,
    query_id: u64,
    response_time: Timestamp,
) -> SignedAckHeader {
    let request = RequestHeader {
        query_id: QueryId::new(query_id),
        client: client.node_id(),
        timestamp: response_time,
        queries_hash: CryptoHash::new([0xAB; 32]),
    };
    let response = SignedResponseHeader::pack_and_sign(
        ResponseHeader {
            request,
            node_id: worker.node_id(),
            timestamp: response_time,
            row_count: 1,
            log_offset: 1,
        },
        worker,
    );
    SignedAckHeader::pack_and_sign(
        AckHeader {
            response,
            node_id: client.node_id(),
            timestamp: response_time.saturating_add(Duration::from_millis(1)),
        },
        client,
    )
}

/// Poll `condition` every 100ms until it holds, panicking after `deadline`.
pub(crate) fn wait_until(deadline: Duration, what: &str, mut condition: impl FnMut() -> bool) {
    let started = Instant::now();
    while !condition() {
        if started.elapsed() > deadline {
            panic!("timed out waiting for: {}", what);
        }
        std::thread::sleep(Duration::from_millis(100));
    }
}
