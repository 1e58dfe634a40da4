/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Constants and helpers for the chain's log lines.
//!
//! The chain logs through the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values
//! are always:
//! 1. The name of the event in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! Block hashes and node ids are rendered as the first seven characters of their Base64 encoding.

use std::time::SystemTime;

// Names of each event in PascalCase for printing:
pub(crate) const PRODUCE_BLOCK: &str = "ProduceBlock";
pub(crate) const PUSH_BLOCK: &str = "PushBlock";
pub(crate) const CHECK_BLOCK: &str = "CheckBlock";
pub(crate) const DROP_STALE_BLOCK: &str = "DropStaleBlock";
pub(crate) const STASH_BLOCK: &str = "StashBlock";
pub(crate) const RUN_TURN: &str = "RunTurn";
pub(crate) const MAIN_CYCLE: &str = "MainCycle";
pub(crate) const FETCH_BLOCK: &str = "FetchBlock";
pub(crate) const SYNC_BLOCK: &str = "SyncBlock";
pub(crate) const SYNC_ACKED_QUERY: &str = "SyncAckedQuery";
pub(crate) const ADVISE_BLOCK_FAILED: &str = "AdviseBlockFailed";
pub(crate) const LOAD_BLOCK: &str = "LoadBlock";
pub(crate) const STOP_CHAIN: &str = "StopChain";

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("Event occured before the Unix Epoch.")
        .as_secs()
}
