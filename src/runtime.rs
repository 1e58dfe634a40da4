/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The chain's wall-clock turn scheduler and shared runtime state.
//!
//! Time since the genesis block is divided into fixed periods. `next_turn` is the height the
//! chain is currently trying to extend to; the main cycle sleeps until that period opens, runs
//! the turn, and advances. The peer expected to produce in a turn is the one at
//! `next_turn mod peer_count` in the configured rotation.

use std::sync::Mutex;
use std::time::Duration;

use crate::block_index::NodeIndex;
use crate::config::Configuration;
use crate::types::basic::{BlockHeight, CryptoHash, DatabaseId, NodeId, Timestamp};
use crate::types::block::Block;
use crate::types::Keypair;
use crate::types::peer_set::PeerSet;

/// The tip of the main chain, as the runtime tracks it.
#[derive(Clone)]
pub(crate) struct Head {
    pub(crate) hash: CryptoHash,
    pub(crate) height: BlockHeight,
    pub(crate) node: Option<NodeIndex>,
}

/// Constants fixed by the genesis block.
#[derive(Clone, Copy)]
struct GenesisInfo {
    time: Timestamp,
    hash: CryptoHash,
}

pub(crate) struct Runtime {
    database_id: DatabaseId,
    server: NodeId,
    keypair: Keypair,
    period: Duration,
    tick: Duration,
    query_ttl: i32,
    genesis: Mutex<GenesisInfo>,
    peers: Mutex<PeerSet>,
    head: Mutex<Head>,
    next_turn: Mutex<BlockHeight>,
}

impl Runtime {
    /// Create a runtime with an unset head. The caller seeds the head by pushing the genesis
    /// block (fresh chain) or restoring persistent state (reload), then calls
    /// [`reset_next_turn`](Self::reset_next_turn).
    pub(crate) fn new(config: &Configuration) -> Runtime {
        Runtime {
            database_id: config.database_id.clone(),
            server: config.server,
            keypair: config.keypair.clone(),
            period: config.period,
            tick: config.tick,
            query_ttl: config.query_ttl,
            genesis: Mutex::new(GenesisInfo {
                time: Timestamp::new(0),
                hash: CryptoHash::zero(),
            }),
            peers: Mutex::new(config.peers.clone()),
            head: Mutex::new(Head {
                hash: CryptoHash::zero(),
                height: BlockHeight::new(-1),
                node: None,
            }),
            next_turn: Mutex::new(BlockHeight::new(0)),
        }
    }

    /// Fix the chain's time origin and identity from its verified genesis block.
    pub(crate) fn set_genesis(&self, genesis: &Block) {
        let mut info = self.genesis.lock().unwrap();
        info.time = genesis.timestamp();
        info.hash = genesis.hash();
    }

    pub(crate) fn genesis_hash(&self) -> CryptoHash {
        self.genesis.lock().unwrap().hash
    }

    pub(crate) fn genesis_time(&self) -> Timestamp {
        self.genesis.lock().unwrap().time
    }

    pub(crate) fn database_id(&self) -> &DatabaseId {
        &self.database_id
    }

    pub(crate) fn server(&self) -> NodeId {
        self.server
    }

    pub(crate) fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    pub(crate) fn tick(&self) -> Duration {
        self.tick
    }

    pub(crate) fn query_ttl(&self) -> i32 {
        self.query_ttl
    }

    pub(crate) fn peers(&self) -> PeerSet {
        self.peers.lock().unwrap().clone()
    }

    /// Replace the peer set. The rotation is redefined from the next turn onward; concurrent
    /// readers see either the old or the new set, never a mix.
    pub(crate) fn update_peers(&self, peers: PeerSet) {
        *self.peers.lock().unwrap() = peers;
    }

    pub(crate) fn head(&self) -> Head {
        self.head.lock().unwrap().clone()
    }

    pub(crate) fn set_head(&self, head: Head) {
        *self.head.lock().unwrap() = head;
    }

    /// The height a timestamp belongs to: `floor((t − genesis_time) / period)`. A timestamp
    /// exactly on a period boundary belongs to the later period. Well-defined for any `t` at or
    /// after the genesis time.
    pub(crate) fn height_from_time(&self, t: Timestamp) -> BlockHeight {
        let elapsed = t - self.genesis_time();
        BlockHeight::new(elapsed.div_euclid(self.period.as_nanos() as i64) as i32)
    }

    /// The height the chain is currently trying to extend to.
    pub(crate) fn next_turn(&self) -> BlockHeight {
        *self.next_turn.lock().unwrap()
    }

    pub(crate) fn advance_next_turn(&self) {
        *self.next_turn.lock().unwrap() += 1;
    }

    /// Reset `next_turn` to `head.height + 1`, its defined value after construction or reload.
    pub(crate) fn reset_next_turn(&self) {
        *self.next_turn.lock().unwrap() = self.head().height + 1;
    }

    /// Whether the local node is the producer expected for the turn the chain is extending to.
    /// Always `false` on an empty peer set: production halts, ingestion is unaffected.
    pub(crate) fn is_my_turn(&self) -> bool {
        self.peers
            .lock()
            .unwrap()
            .producer_at(self.next_turn())
            .map_or(false, |producer| producer == self.server)
    }

    /// The current time, and how long to sleep until the start of the `next_turn` period. A zero
    /// duration means the period is already open and the caller proceeds to run the turn.
    pub(crate) fn next_tick(&self) -> (Timestamp, Duration) {
        let now = Timestamp::now();
        let start =
            self.genesis_time().int() + self.next_turn().int() as i64 * self.period.as_nanos() as i64;
        let remaining = start - now.int();
        if remaining > 0 {
            (now, Duration::from_nanos(remaining as u64))
        } else {
            (now, Duration::ZERO)
        }
    }

    /// Whether a query response produced at `t` is too old to accept: its height is more than
    /// `query_ttl` periods below the current head.
    pub(crate) fn query_time_is_expired(&self, t: Timestamp) -> bool {
        self.height_from_time(t) < self.head().height - self.query_ttl
    }

    /// The lowest height the query index must keep; everything below it is reclaimable. Matches
    /// the TTL reject bound so that no still-acceptable entry is forgotten.
    pub(crate) fn min_valid_height(&self) -> BlockHeight {
        self.head().height - self.query_ttl
    }

    /// A short description of the local node's place in the rotation, for log lines.
    pub(crate) fn peer_info(&self) -> String {
        let peers = self.peers.lock().unwrap();
        match peers.position(&self.server) {
            Some(index) => format!("[{}/{}] {}", index, peers.len(), self.server),
            None => format!("[-/{}] {}", peers.len(), self.server),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    use crate::types::block;
    use crate::types::SigningKey;

    fn test_runtime(peers: Vec<NodeId>, keypair: &Keypair) -> Runtime {
        let genesis = block::genesis(Timestamp::new(0), keypair);
        let config = Configuration {
            database_id: DatabaseId::new("db".to_string()),
            genesis: genesis.clone(),
            peers: PeerSet::new(peers),
            server: keypair.node_id(),
            keypair: keypair.clone(),
            period: Duration::from_secs(60),
            tick: Duration::from_secs(10),
            query_ttl: 10,
        };
        let runtime = Runtime::new(&config);
        runtime.set_genesis(&genesis);
        runtime
    }

    #[test]
    fn boundary_timestamp_belongs_to_the_later_period() {
        let kp = Keypair::new(SigningKey::generate(&mut OsRng));
        let rt = test_runtime(vec![kp.node_id()], &kp);

        let period = Duration::from_secs(60).as_nanos() as i64;
        assert_eq!(rt.height_from_time(Timestamp::new(0)), BlockHeight::new(0));
        assert_eq!(
            rt.height_from_time(Timestamp::new(period - 1)),
            BlockHeight::new(0)
        );
        assert_eq!(
            rt.height_from_time(Timestamp::new(period)),
            BlockHeight::new(1)
        );
        assert_eq!(
            rt.height_from_time(Timestamp::new(3 * period)),
            BlockHeight::new(3)
        );
    }

    #[test]
    fn rotation_follows_next_turn() {
        let kp = Keypair::new(SigningKey::generate(&mut OsRng));
        let me = kp.node_id();
        let other_a = NodeId::new([1u8; 32]);
        let other_b = NodeId::new([2u8; 32]);
        let rt = test_runtime(vec![me, other_a, other_b], &kp);

        // next_turn starts at 0, which is the local node's rotation slot.
        assert!(rt.is_my_turn());
        rt.advance_next_turn();
        assert!(!rt.is_my_turn());
        rt.advance_next_turn();
        assert!(!rt.is_my_turn());
        rt.advance_next_turn();
        assert!(rt.is_my_turn());
    }

    #[test]
    fn empty_peer_set_halts_production() {
        let kp = Keypair::new(SigningKey::generate(&mut OsRng));
        let rt = test_runtime(vec![kp.node_id()], &kp);
        assert!(rt.is_my_turn());
        rt.update_peers(PeerSet::default());
        assert!(!rt.is_my_turn());
    }

    #[test]
    fn expiry_follows_the_head() {
        let kp = Keypair::new(SigningKey::generate(&mut OsRng));
        let rt = test_runtime(vec![kp.node_id()], &kp);
        let period = Duration::from_secs(60).as_nanos() as i64;

        rt.set_head(Head {
            hash: CryptoHash::new([1u8; 32]),
            height: BlockHeight::new(12),
            node: None,
        });

        // Height 1 < 12 − 10: expired. Height 2 is exactly on the bound and still acceptable.
        assert!(rt.query_time_is_expired(Timestamp::new(period)));
        assert!(!rt.query_time_is_expired(Timestamp::new(2 * period)));
        assert_eq!(rt.min_valid_height(), BlockHeight::new(2));
    }

    #[test]
    fn next_tick_is_zero_once_the_period_opens() {
        let kp = Keypair::new(SigningKey::generate(&mut OsRng));
        let genesis = block::genesis(Timestamp::now().saturating_sub(Duration::from_secs(120)), &kp);
        let config = Configuration {
            database_id: DatabaseId::new("db".to_string()),
            genesis: genesis.clone(),
            peers: PeerSet::new(vec![kp.node_id()]),
            server: kp.node_id(),
            keypair: kp.clone(),
            period: Duration::from_secs(60),
            tick: Duration::from_secs(10),
            query_ttl: 10,
        };
        let rt = Runtime::new(&config);
        rt.set_genesis(&genesis);

        // next_turn is 0 and its period opened two minutes ago.
        let (_, sleep) = rt.next_tick();
        assert_eq!(sleep, Duration::ZERO);

        // A turn starting one period from now is still closed.
        *rt.next_turn.lock().unwrap() = BlockHeight::new(3);
        let (_, sleep) = rt.next_tick();
        assert!(sleep > Duration::ZERO && sleep <= Duration::from_secs(60));
    }
}
