/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Merkle root computation over the query hashes committed by a block.

use sha2::Digest;

use super::basic::CryptoHash;
use super::CryptoHasher;

/// Compute the merkle root of `leaves`.
///
/// Leaves are combined pairwise as `sha256(left || right)`, with an odd trailing leaf paired with
/// itself. An empty leaf list hashes to the digest of the empty input, so that "no queries" is
/// still a well-defined commitment.
pub fn root(leaves: &[CryptoHash]) -> CryptoHash {
    if leaves.is_empty() {
        return CryptoHash::new(CryptoHasher::new().finalize().into());
    }

    let mut level: Vec<CryptoHash> = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| combine(&pair[0], pair.last().unwrap()))
            .collect();
    }
    level[0]
}

fn combine(left: &CryptoHash, right: &CryptoHash) -> CryptoHash {
    let mut hasher = CryptoHasher::new();
    hasher.update(left.bytes());
    hasher.update(right.bytes());
    CryptoHash::new(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(b: u8) -> CryptoHash {
        CryptoHash::new([b; 32])
    }

    #[test]
    fn empty_root_is_hash_of_nothing() {
        let expected: [u8; 32] = CryptoHasher::new().finalize().into();
        assert_eq!(root(&[]), CryptoHash::new(expected));
    }

    #[test]
    fn single_leaf_is_its_own_root() {
        assert_eq!(root(&[leaf(1)]), leaf(1));
    }

    #[test]
    fn two_leaves_combine_once() {
        assert_eq!(root(&[leaf(1), leaf(2)]), combine(&leaf(1), &leaf(2)));
    }

    #[test]
    fn odd_leaf_is_paired_with_itself() {
        let left = combine(&leaf(1), &leaf(2));
        let right = combine(&leaf(3), &leaf(3));
        assert_eq!(root(&[leaf(1), leaf(2), leaf(3)]), combine(&left, &right));
    }

    #[test]
    fn root_depends_on_leaf_order() {
        assert_ne!(root(&[leaf(1), leaf(2)]), root(&[leaf(2), leaf(1)]));
    }
}
