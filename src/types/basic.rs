/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that exist only to store bytes, and do not have any major "active" behavior.

use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::{Add, AddAssign, Rem, Sub},
    time::{Duration, SystemTime},
};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use borsh::{BorshDeserialize, BorshSerialize};

/// Height of a block in the chain.
///
/// Heights are not chosen by block producers: a block's height is derived from its timestamp as
/// `floor((timestamp − genesis_time) / period)`. The genesis block is at height 0. The inner type
/// is a signed 32-bit integer so that expressions like `head_height − query_ttl` stay well-defined
/// near the genesis.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct BlockHeight(i32);

impl BlockHeight {
    /// Create a new `BlockHeight` with an `int` inner value.
    pub const fn new(int: i32) -> Self {
        Self(int)
    }

    /// Get the inner `i32` value of this `BlockHeight`.
    pub const fn int(&self) -> i32 {
        self.0
    }

    /// Get the big-endian representation of the inner value of this `BlockHeight`.
    ///
    /// Big-endian keys make lexicographic iteration over the height index chronological (for the
    /// non-negative heights that actually occur on a chain).
    pub fn to_be_bytes(&self) -> [u8; 4] {
        (self.0 as u32).to_be_bytes()
    }

    /// Reconstruct a `BlockHeight` from the representation produced by [`to_be_bytes`](Self::to_be_bytes).
    pub fn from_be_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(bytes) as i32)
    }
}

impl Display for BlockHeight {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Add<i32> for BlockHeight {
    type Output = BlockHeight;
    fn add(self, rhs: i32) -> Self::Output {
        BlockHeight::new(self.0 + rhs)
    }
}

impl AddAssign<i32> for BlockHeight {
    fn add_assign(&mut self, rhs: i32) {
        self.0 += rhs
    }
}

impl Sub<i32> for BlockHeight {
    type Output = BlockHeight;
    fn sub(self, rhs: i32) -> Self::Output {
        BlockHeight::new(self.0 - rhs)
    }
}

impl Rem<i32> for BlockHeight {
    type Output = i32;
    fn rem(self, rhs: i32) -> Self::Output {
        self.0.rem_euclid(rhs)
    }
}

/// Nanoseconds since the Unix epoch, UTC.
///
/// Block headers, responses and acknowledgements all carry `Timestamp`s; turn scheduling divides
/// the span since the genesis timestamp into fixed periods. A timestamp exactly on a period
/// boundary belongs to the later period.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, BorshDeserialize, BorshSerialize,
)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Create a new `Timestamp` from a nanosecond count.
    pub const fn new(nanos: i64) -> Self {
        Self(nanos)
    }

    /// Get the current system time as a `Timestamp`.
    pub fn now() -> Timestamp {
        let since_epoch = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .expect("System time is before the Unix Epoch.");
        Self(since_epoch.as_nanos() as i64)
    }

    /// Get the inner nanosecond count of this `Timestamp`.
    pub const fn int(&self) -> i64 {
        self.0
    }

    /// This `Timestamp` shifted `duration` into the future.
    pub fn saturating_add(&self, duration: Duration) -> Timestamp {
        Self(self.0.saturating_add(duration.as_nanos() as i64))
    }

    /// This `Timestamp` shifted `duration` into the past.
    pub fn saturating_sub(&self, duration: Duration) -> Timestamp {
        Self(self.0.saturating_sub(duration.as_nanos() as i64))
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.0.div_euclid(1_000_000_000), self.0.rem_euclid(1_000_000_000))
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = i64;
    fn sub(self, rhs: Timestamp) -> Self::Output {
        self.0 - rhs.0
    }
}

/// 32-byte cryptographic hash.
///
/// Within the SQL-chain, `CryptoHash`es are always SHA256 digests: of a borsh-encoded block or
/// query header, or of two child nodes of a merkle tree.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct CryptoHash([u8; 32]);

impl CryptoHash {
    /// Create a new `CryptoHash` wrapping `bytes`.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The all-zeroes hash, used as the parent hash of a genesis block.
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Get the inner `[u8; 32]` value of this `CryptoHash`.
    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Whether this is the all-zeroes hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl Display for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&first_seven_base64_chars(&self.0))
    }
}

impl Debug for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&STANDARD_NO_PAD.encode(self.0))
    }
}

/// Ed25519 digital signature.
///
/// Produced using the [`ed25519_dalek`] crate, whose main definitions are re-exported from the
/// [`types`](super) module.
#[derive(Clone, Copy, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct SignatureBytes([u8; 64]);

impl SignatureBytes {
    /// Create a new `SignatureBytes` wrapping `bytes`.
    pub(crate) fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 64]` value of this `SignatureBytes`.
    pub const fn bytes(&self) -> [u8; 64] {
        self.0
    }
}

/// Identity of a peer: the bytes of its Ed25519 verifying key.
///
/// Every peer of a SQL-chain (block producers, serving workers, and acknowledging clients) is
/// identified by an Ed25519 public key, and every artifact it signs names it as the signee.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, BorshDeserialize, BorshSerialize)]
pub struct NodeId([u8; 32]);

impl NodeId {
    /// Create a new `NodeId` wrapping the bytes of a verifying key.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 32]` value of this `NodeId`.
    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl From<ed25519_dalek::VerifyingKey> for NodeId {
    fn from(key: ed25519_dalek::VerifyingKey) -> Self {
        Self(key.to_bytes())
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&first_seven_base64_chars(&self.0))
    }
}

impl Debug for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&STANDARD_NO_PAD.encode(self.0))
    }
}

/// Identifier of the database instance a chain belongs to.
///
/// Carried inside every RPC request so that a multiplexing transport can dispatch it to the right
/// per-database chain.
#[derive(Clone, Debug, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct DatabaseId(String);

impl DatabaseId {
    /// Create a new `DatabaseId` wrapping `id`.
    pub fn new(id: String) -> Self {
        Self(id)
    }

    /// Get the inner `str` of this `DatabaseId`.
    pub fn str(&self) -> &str {
        &self.0
    }
}

impl Display for DatabaseId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-assigned identifier of a query within a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct QueryId(u64);

impl QueryId {
    /// Create a new `QueryId` wrapping `int`.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the inner `u64` value of this `QueryId`.
    pub const fn int(&self) -> u64 {
        self.0
    }
}

// Get a more readable representation of a bytesequence by base64-encoding it and taking the first
// 7 characters.
pub(crate) fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}
