//! Ephemeral response keys.
//!
//! Each key seals exactly one response and is named to the client by an opaque
//! hash.  Records live under their hash; a second map indexes id → hash so a
//! key can be dropped by id.  Both entries share the configured TTL, after
//! which the backend makes the key permanently unavailable.

use std::{sync::Arc, time::Duration};

use base64::{engine::general_purpose::STANDARD, Engine};
use bw_crypto::{hash, BoxKeyPair};
use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    error::StoreError,
    kv::{ExpiringKeyValueStore, MemoryKvStore},
    models::EncryptionKey,
};

pub const DEFAULT_KEY_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Clone)]
pub struct KeyStore {
    records: Arc<dyn ExpiringKeyValueStore<String, EncryptionKey>>,
    index: Arc<dyn ExpiringKeyValueStore<String, String>>,
    ttl: Duration,
}

impl KeyStore {
    pub fn new(
        records: Arc<dyn ExpiringKeyValueStore<String, EncryptionKey>>,
        index: Arc<dyn ExpiringKeyValueStore<String, String>>,
        ttl: Duration,
    ) -> Self {
        Self { records, index, ttl }
    }

    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(
            Arc::new(MemoryKvStore::<String, EncryptionKey>::new()),
            Arc::new(MemoryKvStore::<String, String>::new()),
            ttl,
        )
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Create and persist a fresh key pair.  Fails with
    /// `KeyPersistenceFailed` if either write does not land.
    pub async fn generate(&self) -> Result<EncryptionKey, StoreError> {
        let pair = BoxKeyPair::generate();
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| StoreError::KeyPersistenceFailed(format!("ttl out of range: {e}")))?;
        let key = EncryptionKey {
            id: Uuid::new_v4().to_string(),
            secret_key: STANDARD.encode(pair.secret_bytes()),
            hash: hash::random_key_id(),
            expires_at: Utc::now() + ttl,
        };

        self.records
            .set(key.hash.clone(), key.clone(), self.ttl)
            .await
            .map_err(persistence_failed)?;
        if let Err(e) = self.index.set(key.id.clone(), key.hash.clone(), self.ttl).await {
            if let Err(rollback) = self.records.delete(&key.hash).await {
                warn!(key_id = %key.id, error = %rollback, "orphaned ephemeral key left until expiry");
            }
            return Err(persistence_failed(e));
        }

        debug!(key_id = %key.id, "ephemeral key generated");
        Ok(key)
    }

    /// Live key for `hash`, if any.
    pub async fn get(&self, hash: &str) -> Result<Option<EncryptionKey>, StoreError> {
        let found = self.records.get(&hash.to_string()).await?;
        Ok(found.filter(|k| !k.is_expired(Utc::now())))
    }

    /// One-time lookup: the key is removed as it is returned.
    pub async fn consume(&self, hash: &str) -> Result<Option<EncryptionKey>, StoreError> {
        let Some(key) = self.get(hash).await? else {
            return Ok(None);
        };
        if !self.records.delete(&key.hash).await? {
            // Another caller took it first.
            return Ok(None);
        }
        if let Err(e) = self.index.delete(&key.id).await {
            warn!(key_id = %key.id, error = %e, "stale ephemeral key index entry left until expiry");
        }
        Ok(Some(key))
    }

    /// Returns whether a live key was removed.
    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let Some(hash) = self.index.get(&id.to_string()).await? else {
            return Ok(false);
        };
        self.index.delete(&id.to_string()).await?;
        self.records.delete(&hash).await
    }
}

fn persistence_failed(e: StoreError) -> StoreError {
    warn!(error = %e, "ephemeral key persistence failed");
    match e {
        StoreError::KeyPersistenceFailed(_) => e,
        other => StoreError::KeyPersistenceFailed(other.to_string()),
    }
}
