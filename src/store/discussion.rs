//! Discussion state persistence, keyed by `(room, day)`.

use std::sync::Arc;
use std::time::Duration;

use super::{KvStore, StoreError, DEFAULT_TTL};
use crate::core::address::{DayCount, RoomId};
use crate::game::discussion::DiscussionState;

const STATE_FIELD: &str = "state";

fn discussion_key(room_id: RoomId, day: DayCount) -> String {
    format!("discussion:{}:{}", room_id, day)
}

/// Typed discussion access over a [`KvStore`].
pub struct DiscussionStore<K> {
    kv: Arc<K>,
    ttl: Duration,
}

impl<K> Clone for DiscussionStore<K> {
    fn clone(&self) -> Self {
        Self { kv: self.kv.clone(), ttl: self.ttl }
    }
}

impl<K: KvStore> DiscussionStore<K> {
    /// Wrap a KV store with the default 24h TTL.
    pub fn new(kv: Arc<K>) -> Self {
        Self { kv, ttl: DEFAULT_TTL }
    }

    /// Wrap a KV store with a custom TTL.
    pub fn with_ttl(kv: Arc<K>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    /// Load the state for a day, if started.
    pub async fn load(&self, room_id: RoomId, day: DayCount) -> Result<Option<DiscussionState>, StoreError> {
        let key = discussion_key(room_id, day);
        match self.kv.hget(&key, STATE_FIELD).await? {
            Some(bytes) => bincode::deserialize(&bytes).map(Some).map_err(|e| StoreError::Corrupt {
                key,
                field: STATE_FIELD.to_string(),
                reason: e.to_string(),
            }),
            None => Ok(None),
        }
    }

    /// Persist the state for a day.
    pub async fn save(&self, room_id: RoomId, day: DayCount, state: &DiscussionState) -> Result<(), StoreError> {
        let bytes = bincode::serialize(state).map_err(|e| StoreError::Encode(e.to_string()))?;
        self.kv
            .hset(&discussion_key(room_id, day), STATE_FIELD, bytes, self.ttl)
            .await
    }
}
