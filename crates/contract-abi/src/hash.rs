//! Keccak-256 hashing

use primitive_types::H256;
use sha3::{Digest, Keccak256};

/// Compute Keccak-256 hash of the input data
pub fn keccak256(data: &[u8]) -> H256 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let result: [u8; 32] = hasher.finalize().into();
    H256::from(result)
}
