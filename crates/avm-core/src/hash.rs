//! Keccak-256 commitment primitive and the shared 256-bit hash type.
//!
//! The spec treats Keccak-256 as an opaque hash oracle; we lean on the `sha3`
//! crate rather than hand-rolling it.

use sha3::{Digest, Keccak256};

use crate::U256;

/// A 256-bit commitment. Hashes and integers share one representation
/// throughout this crate, matching the source VM's `uint256_t` convention.
pub type Hash256 = U256;

/// Hashes an arbitrary byte string with Keccak-256.
pub fn keccak256(data: &[u8]) -> Hash256 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let out: [u8; 32] = hasher.finalize().into();
    U256::from_be_bytes(out)
}

/// `Keccak256(tag_byte(0))`, the hash of the arity-0 tuple. Every empty
/// tuple in the system (the initial register, static value, and stack
/// bottoms) shares this value.
pub fn empty_tuple_hash() -> Hash256 {
    keccak256(&[crate::value::tag_byte(0)])
}
