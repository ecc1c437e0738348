//! Access tokens and their session key material.

use std::{sync::Arc, time::Duration};

use base64::{engine::general_purpose::STANDARD, Engine};
use bw_crypto::{hash, kdf, SessionKeys, PUBLIC_KEY_BYTES};
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    error::StoreError,
    models::{AccessToken, Session, SessionKeyMaterial},
    session::{MemorySessionStore, SessionStore},
};

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);

const TOKEN_ENTROPY_BYTES: usize = 32;

#[derive(Clone)]
pub struct TokenStore {
    sessions: Arc<dyn SessionStore>,
}

impl TokenStore {
    pub fn new(sessions: Arc<dyn SessionStore>) -> Self {
        Self { sessions }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionStore::new()))
    }

    /// Login: mint a session for `user_id`.  Key material is derived once from
    /// a fresh IKM and stored alongside the token.
    pub async fn issue(&self, user_id: &str, ttl: Duration) -> Result<Session, StoreError> {
        let ikm = kdf::generate_ikm();
        let keys = SessionKeys::derive(&ikm[..])?;
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StoreError::Backend(format!("session ttl out of range: {e}")))?;

        let session = Session {
            token: AccessToken {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                access_token: hash::random_token(TOKEN_ENTROPY_BYTES),
                refresh_token: hash::random_token(TOKEN_ENTROPY_BYTES),
                ikm: STANDARD.encode(&ikm[..]),
                expires_at: Utc::now() + ttl,
            },
            keys: SessionKeyMaterial::from_keys(&keys),
        };
        self.sessions.insert(session.clone()).await?;
        info!(user_id, token_id = %session.token.id, "session issued");
        Ok(session)
    }

    /// Session for a presented access token.  Expired sessions resolve to nothing.
    pub async fn resolve(&self, access_token: &str) -> Result<Option<Session>, StoreError> {
        let found = self.sessions.find_by_access_token(access_token).await?;
        Ok(found.filter(|s| {
            let live = !s.token.is_expired(Utc::now());
            if !live {
                debug!(token_id = %s.token.id, "expired access token presented");
            }
            live
        }))
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Session>, StoreError> {
        self.sessions.find_by_id(id).await
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Session>, StoreError> {
        self.sessions.find_by_user_id(user_id).await
    }

    /// Logout of a single session.
    pub async fn revoke(&self, id: &str) -> Result<bool, StoreError> {
        let removed = self.sessions.delete_by_id(id).await?;
        if removed {
            info!(token_id = id, "session revoked");
        }
        Ok(removed)
    }

    /// Logout everywhere.  Returns whether no session remains for `user_id`.
    pub async fn revoke_all(&self, user_id: &str) -> Result<bool, StoreError> {
        let removed = self.sessions.delete_by_user_id(user_id).await?;
        info!(user_id, removed, "all sessions revoked");
        Ok(self.sessions.find_by_user_id(user_id).await?.is_empty())
    }

    /// Record the client box key used by the legacy 25519 response format.
    pub async fn bind_client_key(
        &self,
        id: &str,
        public_key: &[u8; PUBLIC_KEY_BYTES],
    ) -> Result<bool, StoreError> {
        self.sessions
            .set_client_public_key(id, Some(STANDARD.encode(public_key)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::SqliteSessionStore;
    use bw_crypto::BoxKeyPair;

    #[tokio::test]
    async fn issue_then_resolve() {
        let tokens = TokenStore::in_memory();
        let session = tokens.issue("42", DEFAULT_SESSION_TTL).await.unwrap();
        assert_eq!(session.user_id(), "42");
        assert_ne!(session.token.access_token, session.token.refresh_token);

        let found = tokens
            .resolve(&session.token.access_token)
            .await
            .unwrap()
            .expect("resolves");
        assert_eq!(found, session);
        assert!(tokens.resolve("not-a-token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn key_material_matches_ikm() {
        let tokens = TokenStore::in_memory();
        let session = tokens.issue("7", DEFAULT_SESSION_TTL).await.unwrap();
        let derived = SessionKeys::derive(&session.token.ikm_bytes().unwrap()).unwrap();
        assert_eq!(
            session.keys.box_pair().unwrap().public_key(),
            derived.box_pair.public_key()
        );
        assert_eq!(
            session.keys.sign_pair().unwrap().public_key(),
            derived.sign_pair.public_key()
        );
    }

    #[tokio::test]
    async fn expired_sessions_do_not_resolve() {
        let tokens = TokenStore::in_memory();
        let session = tokens.issue("1", Duration::from_secs(0)).await.unwrap();
        assert!(tokens.resolve(&session.token.access_token).await.unwrap().is_none());
        assert!(tokens.find_by_id(&session.token.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn revoke_single_and_all() {
        let tokens = TokenStore::in_memory();
        let a = tokens.issue("u", DEFAULT_SESSION_TTL).await.unwrap();
        let b = tokens.issue("u", DEFAULT_SESSION_TTL).await.unwrap();
        let other = tokens.issue("v", DEFAULT_SESSION_TTL).await.unwrap();

        assert!(tokens.revoke(&a.token.id).await.unwrap());
        assert!(!tokens.revoke(&a.token.id).await.unwrap());
        assert!(tokens.resolve(&b.token.access_token).await.unwrap().is_some());

        assert!(tokens.revoke_all("u").await.unwrap());
        assert!(tokens.resolve(&b.token.access_token).await.unwrap().is_none());
        assert!(tokens.resolve(&other.token.access_token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn bind_client_key_is_readable() {
        let tokens = TokenStore::in_memory();
        let session = tokens.issue("u", DEFAULT_SESSION_TTL).await.unwrap();
        let client = BoxKeyPair::generate();
        assert!(tokens
            .bind_client_key(&session.token.id, client.public_key())
            .await
            .unwrap());
        let found = tokens.find_by_id(&session.token.id).await.unwrap().unwrap();
        assert_eq!(found.keys.client_public().unwrap(), Some(*client.public_key()));
        assert!(!tokens.bind_client_key("missing", client.public_key()).await.unwrap());
    }

    #[tokio::test]
    async fn sqlite_backend_behaves_like_memory() {
        let tokens = TokenStore::new(Arc::new(SqliteSessionStore::in_memory().await.unwrap()));
        let a = tokens.issue("u", DEFAULT_SESSION_TTL).await.unwrap();
        let b = tokens.issue("u", DEFAULT_SESSION_TTL).await.unwrap();

        let found = tokens.resolve(&a.token.access_token).await.unwrap().unwrap();
        assert_eq!(found.token.id, a.token.id);
        assert_eq!(found.keys, a.keys);
        assert_eq!(tokens.list_for_user("u").await.unwrap().len(), 2);

        let client = BoxKeyPair::generate();
        assert!(tokens.bind_client_key(&b.token.id, client.public_key()).await.unwrap());
        let found = tokens.find_by_id(&b.token.id).await.unwrap().unwrap();
        assert_eq!(found.keys.client_public().unwrap(), Some(*client.public_key()));

        assert!(tokens.revoke(&a.token.id).await.unwrap());
        assert!(tokens.revoke_all("u").await.unwrap());
        assert!(tokens.list_for_user("u").await.unwrap().is_empty());
    }
}
