//! Keccak Hashing
//!
//! Keccak-256 helpers shared by the signature verifier and the chain
//! ABI encoder (function selectors, event topics).

use sha3::{Digest, Keccak256};

/// Hash output type (256 bits / 32 bytes)
pub type Hash32 = [u8; 32];

/// Keccak-256 of arbitrary data.
pub fn keccak256(data: &[u8]) -> Hash32 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// 4-byte function selector for a canonical Solidity signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// EIP-191 `personal_sign` digest of a UTF-8 message.
pub fn personal_message_hash(message: &str) -> Hash32 {
    let mut hasher = Keccak256::new();
    hasher.update(b"\x19Ethereum Signed Message:\n");
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message.as_bytes());
    hasher.finalize().into()
}
