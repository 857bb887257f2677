//! Secret Role Store
//!
//! Per-room map of address -> (role, salt). Writers for different
//! addresses may interleave freely; there is no cross-address transaction,
//! so readers that need consistency take a full snapshot with
//! [`SecretStore::room_secrets`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::{KvStore, StoreError, DEFAULT_TTL};
use crate::core::address::{Address, RoomId};
use crate::game::role::PlayerSecret;

fn room_key(room_id: RoomId) -> String {
    format!("secrets:{}", room_id)
}

/// Typed secret access over a [`KvStore`].
pub struct SecretStore<K> {
    kv: Arc<K>,
    ttl: Duration,
}

impl<K> Clone for SecretStore<K> {
    fn clone(&self) -> Self {
        Self { kv: self.kv.clone(), ttl: self.ttl }
    }
}

impl<K: KvStore> SecretStore<K> {
    /// Wrap a KV store with the default 24h TTL.
    pub fn new(kv: Arc<K>) -> Self {
        Self::with_ttl(kv, DEFAULT_TTL)
    }

    /// Wrap a KV store with a custom TTL.
    pub fn with_ttl(kv: Arc<K>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    /// Upsert a player's secret and refresh the room's TTL.
    ///
    /// The caller must have verified the reveal signature already.
    pub async fn store_secret(
        &self,
        room_id: RoomId,
        address: Address,
        secret: &PlayerSecret,
    ) -> Result<(), StoreError> {
        let bytes = bincode::serialize(secret).map_err(|e| StoreError::Encode(e.to_string()))?;
        self.kv
            .hset(&room_key(room_id), &address.to_string(), bytes, self.ttl)
            .await?;
        debug!("Stored secret for {} in room {}", address, room_id);
        Ok(())
    }

    /// Snapshot all secrets in a room, or `None` if there are none.
    ///
    /// Entries that fail to decode are skipped, which makes the owning
    /// player count as "missing" rather than poisoning the whole room.
    pub async fn room_secrets(
        &self,
        room_id: RoomId,
    ) -> Result<Option<BTreeMap<Address, PlayerSecret>>, StoreError> {
        let raw = self.kv.hgetall(&room_key(room_id)).await?;
        if raw.is_empty() {
            return Ok(None);
        }

        let mut secrets = BTreeMap::new();
        for (field, bytes) in raw {
            let address: Address = match field.parse() {
                Ok(a) => a,
                Err(e) => {
                    warn!("Skipping secret with bad address field {:?}: {}", field, e);
                    continue;
                }
            };
            match bincode::deserialize::<PlayerSecret>(&bytes) {
                Ok(secret) => {
                    secrets.insert(address, secret);
                }
                Err(e) => warn!("Skipping undecodable secret for {}: {}", address, e),
            }
        }
        Ok(Some(secrets))
    }

    /// Read one player's secret.
    pub async fn secret(&self, room_id: RoomId, address: Address) -> Result<Option<PlayerSecret>, StoreError> {
        let key = room_key(room_id);
        let field = address.to_string();
        match self.kv.hget(&key, &field).await? {
            Some(bytes) => bincode::deserialize(&bytes)
                .map(Some)
                .map_err(|e| StoreError::Corrupt { key, field, reason: e.to_string() }),
            None => Ok(None),
        }
    }

    /// Drop every secret in a room.
    pub async fn clear_room(&self, room_id: RoomId) -> Result<(), StoreError> {
        self.kv.del(&room_key(room_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::role::Role;
    use crate::store::MemoryStore;

    fn secret(role: Role) -> PlayerSecret {
        PlayerSecret { role, salt: "pepper".into() }
    }

    #[tokio::test]
    async fn test_store_and_snapshot() {
        let store = SecretStore::new(Arc::new(MemoryStore::new()));
        let alice = Address::new([0xaa; 20]);
        let bob = Address::new([0xbb; 20]);

        assert!(store.room_secrets(1).await.unwrap().is_none());

        store.store_secret(1, alice, &secret(Role::Mafia)).await.unwrap();
        store.store_secret(1, bob, &secret(Role::Civilian)).await.unwrap();
        store.store_secret(2, bob, &secret(Role::Doctor)).await.unwrap();

        let room1 = store.room_secrets(1).await.unwrap().unwrap();
        assert_eq!(room1.len(), 2);
        assert_eq!(room1[&alice].role, Role::Mafia);
        assert_eq!(store.secret(2, bob).await.unwrap().unwrap().role, Role::Doctor);
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let store = SecretStore::new(Arc::new(MemoryStore::new()));
        let alice = Address::new([0xaa; 20]);

        store.store_secret(1, alice, &secret(Role::Mafia)).await.unwrap();
        store.store_secret(1, alice, &secret(Role::Detective)).await.unwrap();

        let room = store.room_secrets(1).await.unwrap().unwrap();
        assert_eq!(room.len(), 1);
        assert_eq!(room[&alice].role, Role::Detective);
    }

    #[tokio::test]
    async fn test_clear_room() {
        let store = SecretStore::new(Arc::new(MemoryStore::new()));
        store.store_secret(9, Address::new([1; 20]), &secret(Role::Civilian)).await.unwrap();
        store.clear_room(9).await.unwrap();
        assert!(store.room_secrets(9).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_entry_skipped_in_snapshot() {
        let kv = Arc::new(MemoryStore::new());
        let store = SecretStore::new(kv.clone());
        let good = Address::new([1; 20]);
        let bad = Address::new([2; 20]);

        store.store_secret(3, good, &secret(Role::Civilian)).await.unwrap();
        kv.hset("secrets:3", &bad.to_string(), vec![0xff], DEFAULT_TTL).await.unwrap();

        let room = store.room_secrets(3).await.unwrap().unwrap();
        assert_eq!(room.len(), 1);
        assert!(matches!(store.secret(3, bad).await, Err(StoreError::Corrupt { .. })));
    }
}
