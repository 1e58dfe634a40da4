/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The query artifacts committed by the chain: request headers, worker-signed response headers,
//! and client-signed acknowledgement headers.
//!
//! A write query flows through three stages. The client's request is summarized by a
//! [`RequestHeader`]. The worker that applies the query through the replicated log answers with a
//! [`SignedResponseHeader`] embedding the request. The client finally acknowledges the response
//! with a [`SignedAckHeader`] embedding the response; the content hashes of these acks are the
//! units of history that blocks commit.

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::Digest;

use crate::errors::ChainError;
use crate::types::basic::{CryptoHash, NodeId, QueryId, SignatureBytes, Timestamp};
use crate::types::{CryptoHasher, Keypair, Signature, Verifier, VerifyingKey};

/// Summary of a client's write request: who asked what, and when.
#[derive(Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct RequestHeader {
    pub query_id: QueryId,
    /// The requesting client.
    pub client: NodeId,
    pub timestamp: Timestamp,
    /// SHA256 digest of the SQL text of the request.
    pub queries_hash: CryptoHash,
}

impl RequestHeader {
    /// The SHA256 digest of the borsh-encoded request header.
    pub fn compute_hash(&self) -> CryptoHash {
        let mut hasher = CryptoHasher::new();
        hasher.update(self.try_to_vec().unwrap());
        CryptoHash::new(hasher.finalize().into())
    }
}

/// Metadata of a worker's response to a write request.
#[derive(Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ResponseHeader {
    pub request: RequestHeader,
    /// The serving worker.
    pub node_id: NodeId,
    pub timestamp: Timestamp,
    pub row_count: u64,
    /// Offset of the applied query in the replicated log.
    pub log_offset: u64,
}

/// A [`ResponseHeader`] together with its hash and the serving worker's signature.
#[derive(Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SignedResponseHeader {
    pub response: ResponseHeader,
    pub hash: CryptoHash,
    pub signee: NodeId,
    pub signature: SignatureBytes,
}

impl SignedResponseHeader {
    /// Hash and sign `response` with the serving worker's `keypair`.
    pub fn pack_and_sign(response: ResponseHeader, keypair: &Keypair) -> SignedResponseHeader {
        let hash = compute_hash(&response.try_to_vec().unwrap());
        SignedResponseHeader {
            response,
            hash,
            signee: keypair.node_id(),
            signature: keypair.sign(&hash.bytes()),
        }
    }

    /// Check the header hash, that the signee is the serving worker, and the signature.
    pub fn verify(&self) -> Result<(), ChainError> {
        if self.hash != compute_hash(&self.response.try_to_vec().unwrap()) {
            return Err(ChainError::HashVerification);
        }
        if self.signee != self.response.node_id {
            return Err(ChainError::SignatureVerification);
        }
        verify_signature(&self.signee, &self.hash, &self.signature)
    }

    /// The time the response was produced.
    pub fn timestamp(&self) -> Timestamp {
        self.response.timestamp
    }

    /// The time the embedded request was made.
    pub fn request_timestamp(&self) -> Timestamp {
        self.response.request.timestamp
    }
}

/// A client's acknowledgement of a [`SignedResponseHeader`].
#[derive(Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct AckHeader {
    pub response: SignedResponseHeader,
    /// The acknowledging client.
    pub node_id: NodeId,
    pub timestamp: Timestamp,
}

/// An [`AckHeader`] together with its hash and the client's signature.
///
/// These are the units of history the chain commits: a block's `queries` list names
/// `SignedAckHeader`s by their `hash`.
#[derive(Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SignedAckHeader {
    pub ack: AckHeader,
    pub hash: CryptoHash,
    pub signee: NodeId,
    pub signature: SignatureBytes,
}

impl SignedAckHeader {
    /// Hash and sign `ack` with the acknowledging client's `keypair`.
    pub fn pack_and_sign(ack: AckHeader, keypair: &Keypair) -> SignedAckHeader {
        let hash = compute_hash(&ack.try_to_vec().unwrap());
        SignedAckHeader {
            ack,
            hash,
            signee: keypair.node_id(),
            signature: keypair.sign(&hash.bytes()),
        }
    }

    /// Check the embedded response, then the ack's own hash, signee, and signature.
    pub fn verify(&self) -> Result<(), ChainError> {
        self.ack.response.verify()?;
        if self.hash != compute_hash(&self.ack.try_to_vec().unwrap()) {
            return Err(ChainError::HashVerification);
        }
        if self.signee != self.ack.node_id {
            return Err(ChainError::SignatureVerification);
        }
        verify_signature(&self.signee, &self.hash, &self.signature)
    }

    /// The embedded signed response.
    pub fn signed_response_header(&self) -> &SignedResponseHeader {
        &self.ack.response
    }

    /// The time the embedded response was produced. TTL checks and height indexing of acks are
    /// based on this instant.
    pub fn response_timestamp(&self) -> Timestamp {
        self.ack.response.timestamp()
    }
}

fn compute_hash(encoded: &[u8]) -> CryptoHash {
    let mut hasher = CryptoHasher::new();
    hasher.update(encoded);
    CryptoHash::new(hasher.finalize().into())
}

fn verify_signature(
    signee: &NodeId,
    hash: &CryptoHash,
    signature: &SignatureBytes,
) -> Result<(), ChainError> {
    let key = VerifyingKey::from_bytes(&signee.bytes())
        .map_err(|_| ChainError::SignatureVerification)?;
    let signature = Signature::from_bytes(&signature.bytes());
    key.verify(&hash.bytes(), &signature)
        .map_err(|_| ChainError::SignatureVerification)
}
