//! Key-Value Storage
//!
//! The coordinator persists two things: revealed secrets and discussion
//! state. Both live in a hash-map-with-TTL key-value store behind the
//! [`KvStore`] trait, with typed wrappers on top.
//!
//! ```text
//! secrets:{room}            field = lowercased address  -> PlayerSecret
//! discussion:{room}:{day}   field = "state"             -> DiscussionState
//! ```
//!
//! Values are bincode-encoded so the in-memory store behaves exactly like
//! an external byte-oriented KV.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;

pub mod discussion;
pub mod memory;
pub mod secrets;

pub use discussion::DiscussionStore;
pub use memory::MemoryStore;
pub use secrets::SecretStore;

/// Default lifetime of stored keys.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend unreachable or failed.
    #[error("backend error: {0}")]
    Backend(String),
    /// Stored bytes could not be decoded.
    #[error("corrupt value at {key}/{field}: {reason}")]
    Corrupt {
        /// Hash key.
        key: String,
        /// Field within the hash.
        field: String,
        /// Decoder message.
        reason: String,
    },
    /// Value could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),
}

/// Hash-map key-value store with per-key TTL.
///
/// Writing any field refreshes the TTL of the whole key. Expired keys
/// read as absent.
pub trait KvStore: Send + Sync + 'static {
    /// Set one field of a hash and refresh the key's TTL.
    fn hset(
        &self,
        key: &str,
        field: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Read one field.
    fn hget(&self, key: &str, field: &str) -> impl Future<Output = Result<Option<Vec<u8>>, StoreError>> + Send;

    /// Read all fields of a hash (empty if absent or expired).
    fn hgetall(&self, key: &str) -> impl Future<Output = Result<BTreeMap<String, Vec<u8>>, StoreError>> + Send;

    /// Delete a key.
    fn del(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Drop expired keys. Returns how many were removed.
    fn purge_expired(&self) -> impl Future<Output = Result<usize, StoreError>> + Send;
}
