/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The chain orchestrator: ingestion pipeline, main cycle, block production, verification, and
//! peer RPC.
//!
//! A running [`Chain`] owns two long-running threads:
//! 1. The **main cycle** pulls any block the chain is missing, sleeps until the next period
//!    boundary, and runs the turn: if the rotation names the local node, it drains the
//!    currently-unsigned acks from the query index into a new block, signs it, and advises it to
//!    every peer.
//! 2. The **process blocks** thread consumes the block ingestion channel. Future-dated blocks
//!    are stashed and re-enqueued once the chain catches up; current blocks are verified against
//!    the seven-step acceptance policy and pushed; stale blocks are dropped with a warning.
//!
//! Query ingestion is synchronous: RPC handler threads call
//! [`verify_and_push_responded_query`](Chain::verify_and_push_responded_query) and
//! [`verify_and_push_acked_query`](Chain::verify_and_push_acked_query) directly. Disk writes
//! always commit before the memory indices are touched, so a rolled-back write never leaves
//! orphan memory state.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::block_index::BlockIndex;
use crate::config::Configuration;
use crate::errors::ChainError;
use crate::logging;
use crate::messages::{
    AdviseNewBlockReq, AdviseNewBlockResp, Envelope, FetchAckedQueryReq, FetchAckedQueryResp,
    FetchBlockReq, FetchBlockResp,
};
use crate::networking::{ChainRpc, ChainService};
use crate::query_index::QueryIndex;
use crate::runtime::{Head, Runtime};
use crate::store::{BlockStore, KVStore, State};
use crate::types::basic::{BlockHeight, CryptoHash, NodeId, Timestamp};
use crate::types::block::Block;
use crate::types::peer_set::PeerSet;
use crate::types::queries::{SignedAckHeader, SignedResponseHeader};

/// How long the block pipeline waits on its channel before re-checking the shutdown signal.
const BLOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The tip of the main chain.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ChainHead {
    pub hash: CryptoHash,
    pub height: BlockHeight,
}

/// A per-database SQL-chain instance.
///
/// Create a fresh chain with [`new`](Self::new) or reopen a persisted one with
/// [`load`](Self::load), then call [`start`](Self::start). Dropping the handle (or calling
/// [`stop`](Self::stop)) shuts the worker threads down and releases the store.
pub struct Chain<K: KVStore, R: ChainRpc> {
    shared: Arc<ChainShared<K, R>>,
    blocks_rx: Option<Receiver<Block>>,
    main_cycle: Option<JoinHandle<()>>,
    main_cycle_shutdown: Option<Sender<()>>,
    process_blocks: Option<JoinHandle<()>>,
    process_blocks_shutdown: Option<Sender<()>>,
}

impl<K: KVStore, R: ChainRpc> Chain<K, R> {
    /// Create a fresh chain from a verified genesis block, pushing the genesis into both the
    /// store and the memory indices.
    pub fn new(config: Configuration, kv: K, rpc: R) -> Result<Chain<K, R>, ChainError> {
        config.genesis.verify_as_genesis()?;
        let genesis = config.genesis.clone();
        let (chain, shared) = Self::assemble(config, kv, rpc);
        shared.runtime.set_genesis(&genesis);
        shared.push_block(&genesis)?;
        shared.runtime.reset_next_turn();
        Ok(chain)
    }

    /// Reopen a chain from its store, rebuilding the block and query indices. Fails with
    /// [`StateNotFound`](ChainError::StateNotFound) on an empty store and
    /// [`ParentNotFound`](ChainError::ParentNotFound) on a broken block forest.
    pub fn load(config: Configuration, kv: K, rpc: R) -> Result<Chain<K, R>, ChainError> {
        let (chain, shared) = Self::assemble(config, kv, rpc);
        shared.restore()?;
        Ok(chain)
    }

    fn assemble(config: Configuration, kv: K, rpc: R) -> (Chain<K, R>, Arc<ChainShared<K, R>>) {
        let (blocks_tx, blocks_rx) = mpsc::channel();
        let shared = Arc::new(ChainShared {
            store: BlockStore::new(kv),
            block_index: Mutex::new(BlockIndex::new()),
            query_index: QueryIndex::new(),
            runtime: Runtime::new(&config),
            rpc,
            blocks_tx: Mutex::new(blocks_tx),
        });
        let chain = Chain {
            shared: Arc::clone(&shared),
            blocks_rx: Some(blocks_rx),
            main_cycle: None,
            main_cycle_shutdown: None,
            process_blocks: None,
            process_blocks_shutdown: None,
        };
        (chain, shared)
    }

    /// Catch the turn counter up to the wall clock, then start the worker threads. Calling
    /// `start` on an already started chain is a no-op.
    pub fn start(&mut self) {
        let blocks_rx = match self.blocks_rx.take() {
            Some(rx) => rx,
            None => return,
        };

        // Skip the turns that elapsed while the chain was down; blocks for them are pulled from
        // peers by the main cycle.
        loop {
            let height = self
                .shared
                .runtime
                .height_from_time(Timestamp::now());
            if self.shared.runtime.next_turn() >= height {
                break;
            }
            while self.shared.runtime.next_turn() <= height {
                self.shared.runtime.advance_next_turn();
            }
        }

        let (main_cycle_shutdown, shutdown_rx) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        self.main_cycle = Some(thread::spawn(move || shared.main_cycle(shutdown_rx)));
        self.main_cycle_shutdown = Some(main_cycle_shutdown);

        let (process_blocks_shutdown, shutdown_rx) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        self.process_blocks =
            Some(thread::spawn(move || shared.process_blocks(blocks_rx, shutdown_rx)));
        self.process_blocks_shutdown = Some(process_blocks_shutdown);
    }

    /// Signal both worker threads to stop and wait for them. The producer thread is stopped
    /// before the consumer so nothing is left enqueueing into a drained channel.
    pub fn stop(&mut self) {
        if self.main_cycle.is_none() && self.process_blocks.is_none() {
            return;
        }
        log::debug!(
            "{}, {}, {}",
            logging::STOP_CHAIN,
            logging::now_secs(),
            self.shared.runtime.peer_info()
        );
        if let Some(shutdown) = self.main_cycle_shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.main_cycle.take() {
            let _ = handle.join();
        }
        if let Some(shutdown) = self.process_blocks_shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.process_blocks.take() {
            let _ = handle.join();
        }
    }

    /// The current tip of the main chain.
    pub fn head(&self) -> ChainHead {
        let head = self.shared.runtime.head();
        ChainHead {
            hash: head.hash,
            height: head.height,
        }
    }

    /// Replace the peer set; the rotation is redefined from the next turn onward.
    pub fn update_peers(&self, peers: PeerSet) {
        self.shared.runtime.update_peers(peers);
    }

    /// Verify a responded query against the TTL and its signatures, then persist and index it.
    pub fn verify_and_push_responded_query(
        &self,
        resp: &SignedResponseHeader,
    ) -> Result<(), ChainError> {
        self.shared.verify_and_push_responded_query(resp)
    }

    /// Verify an acknowledged query against the TTL and its signatures, then persist and index
    /// it.
    pub fn verify_and_push_acked_query(&self, ack: &SignedAckHeader) -> Result<(), ChainError> {
        self.shared.verify_and_push_acked_query(ack)
    }

    /// Validate a block received from a peer against the acceptance policy and, if it passes,
    /// extend the main chain with it.
    pub fn check_and_push_new_block(&self, block: &Block) -> Result<(), ChainError> {
        self.shared.check_and_push_new_block(block)
    }

    /// The main-chain block at `height`, if the chain has one.
    pub fn fetch_block(&self, height: BlockHeight) -> Result<Option<Block>, ChainError> {
        self.shared.block_at(height)
    }

    /// The acknowledged query named by `header_hash`, looked up in the memory index and then in
    /// the store within the TTL window below `height`.
    pub fn fetch_acked_query(
        &self,
        height: BlockHeight,
        header_hash: &CryptoHash,
    ) -> Result<SignedAckHeader, ChainError> {
        self.shared.acked_query(height, header_hash)
    }

    /// A serving handle for RPC transports to dispatch inbound requests to.
    pub fn service(&self) -> Arc<dyn ChainService> {
        Arc::clone(&self.shared) as Arc<dyn ChainService>
    }
}

impl<K: KVStore, R: ChainRpc> Drop for Chain<K, R> {
    fn drop(&mut self) {
        self.stop()
    }
}

struct ChainShared<K: KVStore, R: ChainRpc> {
    store: BlockStore<K>,
    block_index: Mutex<BlockIndex>,
    query_index: QueryIndex,
    runtime: Runtime,
    rpc: R,
    blocks_tx: Mutex<Sender<Block>>,
}

impl<K: KVStore, R: ChainRpc> ChainShared<K, R> {
    /// Rebuild the memory indices from the store. See DESIGN.md for the recovery order.
    fn restore(&self) -> Result<(), ChainError> {
        let state = self.store.get_state()?.ok_or(ChainError::StateNotFound)?;

        // Root the block forest at the unique zero-parent genesis, then connect the remaining
        // blocks in height order so every parent is indexed before its children.
        let mut blocks = self.store.blocks()?;
        let genesis_position = blocks
            .iter()
            .position(|block| block.parent_hash().is_zero())
            .ok_or(ChainError::ParentNotFound)?;
        let genesis = blocks.swap_remove(genesis_position);
        genesis.verify_as_genesis()?;
        self.runtime.set_genesis(&genesis);

        let mut rest: Vec<(BlockHeight, Block)> = blocks
            .into_iter()
            .map(|block| (self.runtime.height_from_time(block.timestamp()), block))
            .collect();
        rest.sort_by_key(|(height, _)| *height);

        let head_node = {
            let mut block_index = self.block_index.lock().unwrap();
            block_index.insert(BlockHeight::new(0), genesis, None);
            for (height, block) in rest {
                block.verify()?;
                let parent = block_index
                    .position(&block.parent_hash())
                    .ok_or(ChainError::ParentNotFound)?;
                log::debug!(
                    "{}, {}, {}, {}, {}",
                    logging::LOAD_BLOCK,
                    logging::now_secs(),
                    self.runtime.peer_info(),
                    block.hash(),
                    height
                );
                block_index.insert(height, block, Some(parent));
            }
            block_index
                .position(&state.head)
                .ok_or(ChainError::ParentNotFound)?
        };
        self.runtime.set_head(Head {
            hash: state.head,
            height: state.height,
            node: Some(head_node),
        });
        self.runtime.reset_next_turn();

        for entry in self.store.queries_by_height()? {
            for resp in &entry.responses {
                self.query_index.add_response(entry.height, resp);
            }
            for ack in &entry.acks {
                self.query_index.add_ack(entry.height, ack);
            }
        }

        // Replay the main chain so acks committed before the restart stay marked; otherwise the
        // first turn after a reload would commit them a second time.
        {
            let block_index = self.block_index.lock().unwrap();
            let mut node = Some(block_index.node(head_node));
            while let Some(current) = node {
                self.query_index.set_signed_block(current.height, &current.block);
                node = current.parent.map(|parent| block_index.node(parent));
            }
        }

        Ok(())
    }

    fn enqueue_block(&self, block: Block) -> Result<(), ChainError> {
        self.blocks_tx
            .lock()
            .unwrap()
            .send(block)
            .map_err(|_| ChainError::Stopped)
    }

    /// The main cycle: pull any block the chain is missing, then either sleep toward the next
    /// period boundary or run the turn that just opened. Sleeps are bounded by the configured
    /// tick so a shutdown request is never left waiting longer than that.
    fn main_cycle(&self, shutdown: Receiver<()>) {
        loop {
            match shutdown.try_recv() {
                Ok(()) => return,
                Err(TryRecvError::Empty) => (),
                Err(TryRecvError::Disconnected) => {
                    panic!("main cycle thread disconnected from the chain handle")
                }
            }

            self.sync_block();

            let (now, sleep) = self.runtime.next_tick();
            if sleep > Duration::ZERO {
                log::debug!(
                    "{}, {}, {}, {}, {}",
                    logging::MAIN_CYCLE,
                    logging::now_secs(),
                    self.runtime.peer_info(),
                    self.runtime.next_turn(),
                    now
                );
                match shutdown.recv_timeout(sleep.min(self.runtime.tick())) {
                    Ok(()) => return,
                    Err(RecvTimeoutError::Timeout) => (),
                    Err(RecvTimeoutError::Disconnected) => {
                        panic!("main cycle thread disconnected from the chain handle")
                    }
                }
            } else {
                self.run_current_turn(now);
            }
        }
    }

    /// The block ingestion pipeline.
    fn process_blocks(&self, blocks: Receiver<Block>, shutdown: Receiver<()>) {
        let mut stash: Vec<Block> = Vec::new();
        loop {
            match shutdown.try_recv() {
                Ok(()) => return,
                Err(TryRecvError::Empty) => (),
                Err(TryRecvError::Disconnected) => {
                    panic!("block pipeline thread disconnected from the chain handle")
                }
            }

            let block = match blocks.recv_timeout(BLOCK_POLL_INTERVAL) {
                Ok(block) => block,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return,
            };

            let height = self.runtime.height_from_time(block.timestamp());
            let current = self.runtime.next_turn() - 1;
            if height > current {
                // Newer blocks wait until the chain reaches their turn.
                log::debug!(
                    "{}, {}, {}, {}, {}",
                    logging::STASH_BLOCK,
                    logging::now_secs(),
                    self.runtime.peer_info(),
                    block.hash(),
                    height
                );
                stash.push(block);
                continue;
            }

            if height < current {
                // Stale-height blocks are dropped; only the main chain is kept.
                log::warn!(
                    "{}, {}, {}, {}, {}",
                    logging::DROP_STALE_BLOCK,
                    logging::now_secs(),
                    self.runtime.peer_info(),
                    block.hash(),
                    height
                );
            } else if block.producer() == self.runtime.server() {
                // Our own broadcast returning through the channel.
                if let Err(err) = self.push_block(&block) {
                    log::error!(
                        "{}, {}, {}, {}, failed to push own block: {}",
                        logging::PUSH_BLOCK,
                        logging::now_secs(),
                        self.runtime.peer_info(),
                        block.hash(),
                        err
                    );
                }
            } else if let Err(err) = self.check_and_push_new_block(&block) {
                log::error!(
                    "{}, {}, {}, {}, failed to check new block: {}",
                    logging::CHECK_BLOCK,
                    logging::now_secs(),
                    self.runtime.peer_info(),
                    block.hash(),
                    err
                );
            }

            // Return the stash to the channel. The channel is unbounded, so this cannot block
            // against a shutdown.
            for stashed in stash.drain(..) {
                let _ = self.enqueue_block(stashed);
            }
        }
    }

    /// If the block of the previous turn was never advised, pull it from the peers in rotation
    /// order until one of them serves it.
    fn sync_block(&self) {
        let current = self.runtime.next_turn() - 1;
        if self.runtime.head().height >= current {
            return;
        }

        let req = FetchBlockReq {
            envelope: Envelope::new(self.runtime.server()),
            database_id: self.runtime.database_id().clone(),
            height: current,
        };
        let peers = self.runtime.peers();
        for peer in peers.iter().filter(|peer| **peer != self.runtime.server()) {
            match self.rpc.fetch_block(peer, req.clone()) {
                Ok(FetchBlockResp { block: Some(block) }) => {
                    log::debug!(
                        "{}, {}, {}, {}, {}",
                        logging::SYNC_BLOCK,
                        logging::now_secs(),
                        self.runtime.peer_info(),
                        peer,
                        current
                    );
                    let _ = self.enqueue_block(block);
                    return;
                }
                Ok(FetchBlockResp { block: None }) => (),
                Err(err) => log::error!(
                    "{}, {}, {}, {}, failed to fetch block: {}",
                    logging::SYNC_BLOCK,
                    logging::now_secs(),
                    self.runtime.peer_info(),
                    peer,
                    err
                ),
            }
        }
        log::error!(
            "{}, {}, {}, cannot get block at height {} from any peer",
            logging::SYNC_BLOCK,
            logging::now_secs(),
            self.runtime.peer_info(),
            current
        );
    }

    /// Run the turn that just opened: produce a block if the rotation names the local node.
    /// Whatever the outcome, the turn counter advances and the query index barrier follows the
    /// head.
    fn run_current_turn(&self, now: Timestamp) {
        log::debug!(
            "{}, {}, {}, {}, {}",
            logging::RUN_TURN,
            logging::now_secs(),
            self.runtime.peer_info(),
            self.runtime.next_turn(),
            now
        );
        if self.runtime.is_my_turn() {
            if let Err(err) = self.produce_block(now) {
                log::error!(
                    "{}, {}, {}, failed to produce block: {}",
                    logging::PRODUCE_BLOCK,
                    logging::now_secs(),
                    self.runtime.peer_info(),
                    err
                );
            }
        }
        self.runtime.advance_next_turn();
        self.query_index.advance_barrier(self.runtime.min_valid_height());
    }

    /// Pack, sign, and enqueue a block committing every currently-unsigned ack, then advise it
    /// to all other peers in parallel. Broadcast failures are logged and dropped, since peers
    /// also pull through [`sync_block`](Self::sync_block).
    fn produce_block(&self, now: Timestamp) -> Result<(), ChainError> {
        let queries = self
            .query_index
            .mark_and_collect_unsigned_acks(self.runtime.next_turn());
        let block = Block::pack_and_sign(
            self.runtime.server(),
            self.runtime.genesis_hash(),
            self.runtime.head().hash,
            now,
            queries,
            self.runtime.keypair(),
        );
        log::debug!(
            "{}, {}, {}, {}, {}",
            logging::PRODUCE_BLOCK,
            logging::now_secs(),
            self.runtime.peer_info(),
            block.hash(),
            self.runtime.next_turn()
        );
        self.enqueue_block(block.clone())?;

        let req = AdviseNewBlockReq {
            envelope: Envelope::new(self.runtime.server()),
            database_id: self.runtime.database_id().clone(),
            block,
        };
        let peers = self.runtime.peers();
        let mut advisers = Vec::new();
        for peer in peers.iter().filter(|peer| **peer != self.runtime.server()) {
            let rpc = self.rpc.clone();
            let req = req.clone();
            let peer = *peer;
            advisers.push(thread::spawn(move || {
                if let Err(err) = rpc.advise_new_block(&peer, req) {
                    log::error!(
                        "{}, {}, {}, failed to advise new block: {}",
                        logging::ADVISE_BLOCK_FAILED,
                        logging::now_secs(),
                        peer,
                        err
                    );
                }
            }));
        }
        for adviser in advisers {
            let _ = adviser.join();
        }
        Ok(())
    }

    /// The acceptance policy for blocks from other peers:
    /// 1. a block that already is the head is a no-op;
    /// 2. the block must extend the head;
    /// 3. its producer must be a known peer;
    /// 4. the producer must hold the rotation slot of the head's successor;
    /// 5. every committed ack must be held by the query index, fetching missing ones from the
    ///    producer;
    /// 6. the block's merkle root and signature must verify;
    /// 7. only then is the chain extended.
    fn check_and_push_new_block(&self, block: &Block) -> Result<(), ChainError> {
        let height = self.runtime.height_from_time(block.timestamp());
        let head = self.runtime.head();
        let peers = self.runtime.peers();
        log::debug!(
            "{}, {}, {}, {}, {}, {}",
            logging::CHECK_BLOCK,
            logging::now_secs(),
            self.runtime.peer_info(),
            block.hash(),
            block.producer(),
            height
        );

        if head.height == height && head.hash == block.hash() {
            // Maybe already accepted through the sync path.
            return Ok(());
        }
        if block.parent_hash() != head.hash {
            return Err(ChainError::InvalidBlock);
        }

        let index = peers
            .position(&block.producer())
            .ok_or(ChainError::UnknownProducer)?;
        let expected = (head.height + 1) % peers.len() as i32;
        if index as i32 != expected {
            return Err(ChainError::InvalidProducer);
        }

        for query in &block.queries {
            if !self
                .query_index
                .check_ack_from_block(height, &block.hash(), query)?
            {
                self.sync_acked_query(height, query, &block.producer())?;
                if !self
                    .query_index
                    .check_ack_from_block(height, &block.hash(), query)?
                {
                    return Err(ChainError::QueryNotCached);
                }
            }
        }

        block.verify()?;
        self.push_block(block)
    }

    /// Fetch a missing acknowledged query from the block's producer, verify it, and push it.
    fn sync_acked_query(
        &self,
        height: BlockHeight,
        ack: &CryptoHash,
        producer: &NodeId,
    ) -> Result<(), ChainError> {
        let req = FetchAckedQueryReq {
            envelope: Envelope::new(self.runtime.server()),
            database_id: self.runtime.database_id().clone(),
            height,
            header_hash: *ack,
        };
        match self.rpc.fetch_acked_query(producer, req) {
            Ok(resp) => self.verify_and_push_acked_query(&resp.ack),
            Err(err) => {
                log::error!(
                    "{}, {}, {}, failed to fetch acked query: {}",
                    logging::SYNC_ACKED_QUERY,
                    logging::now_secs(),
                    self.runtime.peer_info(),
                    err
                );
                Err(ChainError::Rpc(err))
            }
        }
    }

    /// Extend the main chain: persist state and block atomically, then update the block index,
    /// the query index, and the head (memory strictly after disk).
    fn push_block(&self, block: &Block) -> Result<(), ChainError> {
        let height = self.runtime.height_from_time(block.timestamp());
        let state = State {
            head: block.hash(),
            height,
        };
        self.store.put_block(block, &state)?;

        let node = {
            let mut block_index = self.block_index.lock().unwrap();
            let parent = block_index.position(&block.parent_hash());
            block_index.insert(height, block.clone(), parent)
        };
        self.query_index.set_signed_block(height, block);
        self.runtime.set_head(Head {
            hash: block.hash(),
            height,
            node: Some(node),
        });
        log::debug!(
            "{}, {}, {}, {}, {}, {}",
            logging::PUSH_BLOCK,
            logging::now_secs(),
            self.runtime.peer_info(),
            block.hash(),
            block.producer(),
            height
        );
        Ok(())
    }

    fn verify_and_push_responded_query(
        &self,
        resp: &SignedResponseHeader,
    ) -> Result<(), ChainError> {
        if self.runtime.query_time_is_expired(resp.timestamp()) {
            return Err(ChainError::QueryExpired);
        }
        resp.verify()?;
        self.push_responded_query(resp)
    }

    fn verify_and_push_acked_query(&self, ack: &SignedAckHeader) -> Result<(), ChainError> {
        if self.runtime.query_time_is_expired(ack.response_timestamp()) {
            return Err(ChainError::QueryExpired);
        }
        ack.verify()?;
        self.push_acked_query(ack)
    }

    /// Responses are indexed under the height of the request timestamp.
    fn push_responded_query(&self, resp: &SignedResponseHeader) -> Result<(), ChainError> {
        let height = self.runtime.height_from_time(resp.request_timestamp());
        self.store.put_response(height, resp)?;
        self.query_index.add_response(height, resp);
        Ok(())
    }

    /// Acks are indexed under the height of the response timestamp.
    fn push_acked_query(&self, ack: &SignedAckHeader) -> Result<(), ChainError> {
        let height = self.runtime.height_from_time(ack.response_timestamp());
        self.store.put_ack(height, ack)?;
        self.query_index.add_ack(height, ack);
        Ok(())
    }

    fn block_at(&self, height: BlockHeight) -> Result<Option<Block>, ChainError> {
        let head = self.runtime.head();
        let hash = match head.node {
            Some(node) => {
                let block_index = self.block_index.lock().unwrap();
                block_index.ancestor(node, height).map(|node| node.hash)
            }
            None => None,
        };
        match hash {
            Some(hash) => self.store.get_block(&hash),
            None => Ok(None),
        }
    }

    fn acked_query(
        &self,
        height: BlockHeight,
        header_hash: &CryptoHash,
    ) -> Result<SignedAckHeader, ChainError> {
        if let Some(ack) = self.query_index.get_ack(height, header_hash) {
            return Ok(ack);
        }
        let mut h = height - self.runtime.query_ttl();
        while h <= height {
            if let Some(ack) = self.store.get_ack(h, header_hash)? {
                return Ok(ack);
            }
            h += 1;
        }
        Err(ChainError::QueryNotCached)
    }
}

impl<K: KVStore, R: ChainRpc> ChainService for ChainShared<K, R> {
    fn advise_new_block(&self, req: AdviseNewBlockReq) -> Result<AdviseNewBlockResp, ChainError> {
        self.enqueue_block(req.block)?;
        Ok(AdviseNewBlockResp {})
    }

    fn fetch_block(&self, req: FetchBlockReq) -> Result<FetchBlockResp, ChainError> {
        log::debug!(
            "{}, {}, {}, {}, {}",
            logging::FETCH_BLOCK,
            logging::now_secs(),
            self.runtime.peer_info(),
            req.envelope.origin,
            req.height
        );
        Ok(FetchBlockResp {
            block: self.block_at(req.height)?,
        })
    }

    fn fetch_acked_query(
        &self,
        req: FetchAckedQueryReq,
    ) -> Result<FetchAckedQueryResp, ChainError> {
        Ok(FetchAckedQueryResp {
            ack: self.acked_query(req.height, &req.header_hash)?,
        })
    }
}
