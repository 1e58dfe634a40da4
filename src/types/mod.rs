/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of the data types that are stored on disk, carried over the wire, or exchanged
//! between the chain's components.
//!
//! The cryptographic backing is Ed25519 signatures (via [`ed25519_dalek`]) and SHA256 digests
//! (via [`sha2`]). Both are re-exported from this module, next to the [`Keypair`] wrapper that
//! holds the local node's signing key, so that embedders and transports never need to name the
//! backing crates themselves.

pub mod basic;

pub mod block;

pub mod merkle;

pub mod peer_set;

pub mod queries;

use self::basic::{NodeId, SignatureBytes};

// re-exports below.
pub use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

pub use sha2::Sha256 as CryptoHasher;

/// The local node's Ed25519 signing key.
///
/// Everything a SQL-chain peer signs, whether a block header, a response, or an
/// acknowledgement, is signed with this key, and the key's public half doubles as the peer's
/// [`NodeId`] in the rotation.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    pub fn new(signing_key: SigningKey) -> Keypair {
        Keypair { signing_key }
    }

    /// The node identity derived from the public half of the key.
    pub fn node_id(&self) -> NodeId {
        NodeId::new(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign `message`, returning the raw signature bytes that signed artifacts carry.
    pub(crate) fn sign(&self, message: &[u8]) -> SignatureBytes {
        SignatureBytes::new(self.signing_key.sign(message).to_bytes())
    }
}
