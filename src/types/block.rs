/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the 'block' type and its methods.

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::Digest;

use crate::errors::ChainError;
use crate::types::basic::{CryptoHash, NodeId, SignatureBytes, Timestamp};
use crate::types::{CryptoHasher, Keypair, Signature, Verifier, VerifyingKey};
use crate::types::merkle;

/// Version tag carried by every block header.
pub const BLOCK_VERSION: u32 = 0x0100_0000;

/// The signed part of a block: chain identity, position, and the commitment to the block's
/// queries.
#[derive(Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Header {
    pub version: u32,
    pub producer: NodeId,
    pub genesis_hash: CryptoHash,
    pub parent_hash: CryptoHash,
    pub merkle_root: CryptoHash,
    pub timestamp: Timestamp,
}

impl Header {
    /// The SHA256 digest of the borsh-encoded header. This is the value block signatures are
    /// formed over.
    pub fn compute_hash(&self) -> CryptoHash {
        let mut hasher = CryptoHasher::new();
        hasher.update(self.try_to_vec().unwrap());
        CryptoHash::new(hasher.finalize().into())
    }
}

/// A [`Header`] together with its hash and the producer's signature over the hash.
#[derive(Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SignedHeader {
    pub header: Header,
    pub hash: CryptoHash,
    pub signee: NodeId,
    pub signature: SignatureBytes,
}

impl SignedHeader {
    pub(crate) fn sign(header: Header, keypair: &Keypair) -> SignedHeader {
        let hash = header.compute_hash();
        let signature = keypair.sign(&hash.bytes());
        SignedHeader {
            header,
            hash,
            signee: keypair.node_id(),
            signature,
        }
    }

    /// Check that the hash is the digest of the header, that the signee is the named producer,
    /// and that the signature over the hash verifies against the signee's key.
    pub fn verify(&self) -> Result<(), ChainError> {
        if self.hash != self.header.compute_hash() {
            return Err(ChainError::HashVerification);
        }
        if self.signee != self.header.producer {
            return Err(ChainError::SignatureVerification);
        }
        let key = VerifyingKey::from_bytes(&self.signee.bytes())
            .map_err(|_| ChainError::SignatureVerification)?;
        let signature = Signature::from_bytes(&self.signature.bytes());
        key.verify(&self.hash.bytes(), &signature)
            .map_err(|_| ChainError::SignatureVerification)
    }
}

/// A block: a signed header plus the ordered content hashes of the
/// [`SignedAckHeader`](super::queries::SignedAckHeader)s it commits.
#[derive(Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Block {
    pub signed_header: SignedHeader,
    pub queries: Vec<CryptoHash>,
}

impl Block {
    /// Build and sign a block committing `queries`, with its merkle root, header hash and
    /// signature filled in.
    pub fn pack_and_sign(
        producer: NodeId,
        genesis_hash: CryptoHash,
        parent_hash: CryptoHash,
        timestamp: Timestamp,
        queries: Vec<CryptoHash>,
        keypair: &Keypair,
    ) -> Block {
        let header = Header {
            version: BLOCK_VERSION,
            producer,
            genesis_hash,
            parent_hash,
            merkle_root: merkle::root(&queries),
            timestamp,
        };
        Block {
            signed_header: SignedHeader::sign(header, keypair),
            queries,
        }
    }

    /// Check that the merkle root commits to `queries` and that the signed header verifies.
    pub fn verify(&self) -> Result<(), ChainError> {
        if self.signed_header.header.merkle_root != merkle::root(&self.queries) {
            return Err(ChainError::HashVerification);
        }
        self.signed_header.verify()
    }

    /// Check that this block is a well-formed genesis: self-signed and without a parent.
    pub fn verify_as_genesis(&self) -> Result<(), ChainError> {
        if !self.signed_header.header.parent_hash.is_zero() {
            return Err(ChainError::InvalidBlock);
        }
        self.verify()
    }

    pub fn hash(&self) -> CryptoHash {
        self.signed_header.hash
    }

    pub fn parent_hash(&self) -> CryptoHash {
        self.signed_header.header.parent_hash
    }

    pub fn producer(&self) -> NodeId {
        self.signed_header.header.producer
    }

    pub fn timestamp(&self) -> Timestamp {
        self.signed_header.header.timestamp
    }
}

/// Create a signed genesis block for a fresh chain.
///
/// The genesis commits no queries, names the all-zeroes hash as its parent, and fixes the chain's
/// time origin at `timestamp`. Its own hash doubles as the chain's `genesis_hash`; the field in
/// its header is zero since the hash cannot name itself.
pub fn genesis(timestamp: Timestamp, keypair: &Keypair) -> Block {
    Block::pack_and_sign(
        keypair.node_id(),
        CryptoHash::zero(),
        CryptoHash::zero(),
        timestamp,
        Vec::new(),
        keypair,
    )
}
